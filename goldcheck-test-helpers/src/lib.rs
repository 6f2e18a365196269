// SPDX-License-Identifier: Apache-2.0

mod scripted;

pub use scripted::{ScriptedAdjudicator, ScriptedSynthesisOracle, TableModel};

use std::path::PathBuf;

/// Compare arbitrary text against a golden file on disk, with an opt-in
/// update mechanism controlled by the GOLDCHECK_UPDATE_GOLDEN environment
/// variable. Uses full-string equality (no trimming) for exactness.
pub fn compare_golden_text(got: &str, relpath: &str) {
    let golden_path = std::path::Path::new(relpath);
    if std::env::var("GOLDCHECK_UPDATE_GOLDEN").is_ok()
        || !golden_path.exists()
        || golden_path.metadata().map(|m| m.len()).unwrap_or(0) == 0
    {
        log::info!(
            "compare_golden_text; writing golden file to {}",
            golden_path.display()
        );
        if let Some(parent) = golden_path.parent() {
            std::fs::create_dir_all(parent).expect("create golden dir");
        }
        std::fs::write(golden_path, got).expect("write golden");
    } else {
        log::info!(
            "compare_golden_text; reading golden file from {}",
            golden_path.display()
        );
        let want = std::fs::read_to_string(golden_path).expect("read golden");
        assert_eq!(
            got, want,
            "Golden mismatch; run with GOLDCHECK_UPDATE_GOLDEN=1 to update."
        );
    }
}

/// Creates a unique temporary directory for tests under the system temp dir,
/// using the provided base prefix combined with the process id and a nanosecond
/// timestamp.
///
/// The directory is cleaned up automatically when the returned `TempDir` is
/// dropped.
pub fn make_test_tmpdir(base_prefix: &str) -> tempfile::TempDir {
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let prefix = format!("{}_{}_{}", base_prefix, pid, nanos);
    tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir_in(std::env::temp_dir())
        .expect("tempdir create")
}

/// Returns the path of `tool` if it is on `PATH`; tests that need an
/// external simulator log and return early otherwise.
pub fn tool_on_path(tool: &str) -> Option<PathBuf> {
    match which::which(tool) {
        Ok(path) => Some(path),
        Err(_) => {
            log::warn!("{} not found on PATH; skipping", tool);
            None
        }
    }
}
