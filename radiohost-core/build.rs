//! Injects the commit identifier reported by `version_info()`.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=RADIOHOST_COMMIT");
    println!("cargo:rerun-if-changed=../.git/HEAD");

    let commit = std::env::var("RADIOHOST_COMMIT")
        .ok()
        .filter(|c| !c.trim().is_empty())
        .or_else(git_short_head)
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=RADIOHOST_COMMIT={}", commit.trim());
}

fn git_short_head() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let head = String::from_utf8(output.stdout).ok()?;
    let head = head.trim();
    (!head.is_empty()).then(|| head.to_string())
}
