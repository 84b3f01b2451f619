use std::process::Command;

fn ambit() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ambit"));
    cmd.env_clear();
    cmd
}

#[test]
fn test_missing_secrets_exit_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let out = ambit()
        .current_dir(dir.path())
        .args(["--config", "/nonexistent/ambit.toml", "serve"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("AMB_SESSION_KEY"), "stderr: {stderr}");
}

#[test]
fn test_missing_password_hash_exit_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let out = ambit()
        .current_dir(dir.path())
        .env("AMB_SESSION_KEY", "k")
        .args(["--config", "/nonexistent/ambit.toml", "--quiet"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("AMB_PASSWORD_HASH"));
}

#[test]
fn test_version_exits_zero() {
    let out = ambit().arg("version").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("ambit v"));
}
