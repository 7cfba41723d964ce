use std::process::Command;

use chrono::Utc;

fn main() {
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/");

    let version = env!("CARGO_PKG_VERSION");
    let version_string = match git_short_hash() {
        Some(hash) if !is_release_commit(version) => {
            let build_date = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            format!("{version}+{hash}.{build_date}")
        }
        _ => version.to_owned(),
    };

    println!("cargo:rustc-env=WSM_VERSION={version_string}");
}

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8(output.stdout).ok()?.trim().to_owned())
    } else {
        None
    }
}

fn is_release_commit(version: &str) -> bool {
    let expected_tag = format!("wsm-cli@v{version}");

    match Command::new("git").args(["tag", "--points-at", "HEAD"]).output() {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .any(|line| line.trim() == expected_tag),
        _ => false,
    }
}
