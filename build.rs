// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=BARCODE_SCANNER_VERSION");

    // Packagers can pin the version without a git checkout
    let version = std::env::var("BARCODE_SCANNER_VERSION").unwrap_or_else(|_| git_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `0.1.0-abcdef1` on a tag, `0.1.0-dirty-abcdef1` after it, the package
/// version when git is unavailable
fn git_version() -> String {
    let package = env!("CARGO_PKG_VERSION");
    let Some(hash) = git(&["rev-parse", "--short", "HEAD"]) else {
        return package.to_string();
    };

    match git(&["describe", "--tags", "--match", "v*"]) {
        Some(described) => {
            let described = described.strip_prefix('v').unwrap_or(&described);
            // "<tag>-<commits>-g<hash>" when HEAD is past the tag
            match described.rsplitn(3, '-').collect::<Vec<_>>().as_slice() {
                [_, _, tag] => format!("{}-dirty-{}", tag, hash),
                _ => format!("{}-{}", described, hash),
            }
        }
        None => format!("{}-{}", package, hash),
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|s| !s.is_empty())
}
