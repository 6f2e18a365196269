// SPDX-License-Identifier: Apache-2.0

//! License hygiene for the workspace: every Rust source starts with the
//! SPDX line, and every crate manifest declares the same license.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const LICENSE: &str = "Apache-2.0";

/// Build output, VCS metadata and vendored reference trees.
const SKIPPED_DIRS: &[&str] = &["target", ".git", "examples"];

/// Every file under `root`, skipping `SKIPPED_DIRS`.
fn workspace_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut worklist = vec![root.to_path_buf()];
    while let Some(dir) = worklist.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if path.is_dir() {
                if !SKIPPED_DIRS.contains(&name) {
                    worklist.push(path);
                }
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn first_line(path: &Path) -> Option<String> {
    let file = fs::File::open(path).ok()?;
    BufReader::new(file).lines().next()?.ok()
}

#[test]
fn test_rust_sources_carry_spdx_line() {
    let want = format!("// SPDX-License-Identifier: {}", LICENSE);
    let missing: Vec<PathBuf> = workspace_files(Path::new(env!("CARGO_MANIFEST_DIR")))
        .into_iter()
        .filter(|p| p.extension().map_or(false, |e| e == "rs"))
        .filter(|p| first_line(p).map_or(true, |line| !line.starts_with(&want)))
        .collect();
    assert!(
        missing.is_empty(),
        "files missing the SPDX line: {:?}",
        missing
    );
}

#[test]
fn test_crate_manifests_declare_matching_license() {
    let manifests: Vec<PathBuf> = workspace_files(Path::new(env!("CARGO_MANIFEST_DIR")))
        .into_iter()
        .filter(|p| p.file_name().map_or(false, |n| n == "Cargo.toml"))
        .collect();
    // The root package plus the driver and test helpers.
    assert!(manifests.len() >= 3, "found manifests: {:?}", manifests);
    let want = format!("license = \"{}\"", LICENSE);
    let mismatched: Vec<&PathBuf> = manifests
        .iter()
        .filter(|p| {
            let text = fs::read_to_string(p).unwrap();
            !text.lines().any(|line| line.trim() == want)
        })
        .collect();
    assert!(
        mismatched.is_empty(),
        "manifests without `{}`: {:?}",
        want,
        mismatched
    );
}
