use std::process::Command;
use std::{env, path::PathBuf};

use tempfile::tempdir;

fn cli_bin_path() -> PathBuf {
    if let Ok(path) = env::var("CARGO_BIN_EXE_fabsync-cli") {
        return PathBuf::from(path);
    }
    if let Ok(path) = env::var("CARGO_BIN_EXE_fabsync_cli") {
        return PathBuf::from(path);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .map(PathBuf::from)
        .expect("workspace root");
    let bin_name = if cfg!(windows) {
        "fabsync-cli.exe"
    } else {
        "fabsync-cli"
    };
    let fallback = workspace_root.join("target").join("debug").join(bin_name);
    assert!(
        fallback.exists(),
        "fabsync-cli binary not found at {}",
        fallback.display()
    );
    fallback
}

#[test]
fn missing_credentials_process_contract_fails_before_any_network() {
    // Pseudocode:
    // Given no FABRIC_* environment variables
    // When running `fabsync-cli deploy dev`
    // Then process exits non-zero naming the missing variable.
    let root = tempdir().expect("tempdir");
    let output = Command::new(cli_bin_path())
        .current_dir(root.path())
        .env_remove("FABRIC_TENANT_ID")
        .env_remove("FABRIC_CLIENT_ID")
        .env_remove("FABRIC_CLIENT_SECRET")
        .args(["deploy", "dev"])
        .output()
        .expect("run deploy");

    assert!(
        !output.status.success(),
        "stdout: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("FABRIC_TENANT_ID"));
}

#[test]
fn missing_mapping_file_process_contract_names_the_path() {
    // Pseudocode:
    // Given credentials but no mapping file
    // When running `fabsync-cli deploy dev`
    // Then process exits non-zero before acquiring a token.
    let root = tempdir().expect("tempdir");
    let output = Command::new(cli_bin_path())
        .current_dir(root.path())
        .env("FABRIC_TENANT_ID", "tenant")
        .env("FABRIC_CLIENT_ID", "client")
        .env("FABRIC_CLIENT_SECRET", "secret")
        .args(["deploy", "dev", "--mapping-file", "absent-mapping.yml"])
        .output()
        .expect("run deploy");

    assert!(
        !output.status.success(),
        "stdout: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("workspace mapping"));
    assert!(stderr.contains("absent-mapping.yml"));
}

#[test]
fn malformed_mapping_process_contract_returns_non_zero() {
    // Pseudocode:
    // Given a mapping whose item-type scope holds a bare string
    // When running `fabsync-cli deploy dev`
    // Then process exits non-zero with the canonicalization error.
    let root = tempdir().expect("tempdir");
    let mapping_path = root.path().join("workspace-mapping.yml");
    std::fs::write(&mapping_path, "Sales:\n  Report: ws-oops\n").expect("write mapping");

    let output = Command::new(cli_bin_path())
        .current_dir(root.path())
        .env("FABRIC_TENANT_ID", "tenant")
        .env("FABRIC_CLIENT_ID", "client")
        .env("FABRIC_CLIENT_SECRET", "secret")
        .args(["deploy", "dev"])
        .output()
        .expect("run deploy");

    assert!(
        !output.status.success(),
        "stdout: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("must map environments"));
}

#[test]
fn help_process_contract_lists_both_subcommands() {
    let output = Command::new(cli_bin_path())
        .arg("--help")
        .output()
        .expect("run help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("deploy"));
    assert!(stdout.contains("push"));
}
