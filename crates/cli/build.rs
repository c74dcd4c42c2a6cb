use std::env;
use std::process::Command;

/// Release tarballs carry no `.git`, so packagers can pin the commit instead.
const COMMIT_OVERRIDE: &str = "LSCOPE_BUILD_COMMIT";

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

fn build_commit() -> String {
    if let Ok(pinned) = env::var(COMMIT_OVERRIDE) {
        if !pinned.trim().is_empty() {
            return pinned.trim().to_string();
        }
    }
    match git(&["rev-parse", "--short=9", "HEAD"]) {
        Some(hash) if !hash.is_empty() => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .is_some_and(|s| !s.is_empty());
            if dirty {
                format!("{hash}-dirty")
            } else {
                hash
            }
        }
        _ => "unknown".to_string(),
    }
}

fn main() {
    println!("cargo:rerun-if-env-changed={COMMIT_OVERRIDE}");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/index");

    println!("cargo:rustc-env=LSCOPE_COMMIT={}", build_commit());
    for (var, key) in [("TARGET", "LSCOPE_TARGET"), ("PROFILE", "LSCOPE_PROFILE")] {
        let value = env::var(var).unwrap_or_else(|_| "unknown".to_string());
        println!("cargo:rustc-env={key}={value}");
    }
}
