#![allow(dead_code)]

use std::path::PathBuf;

pub fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace")
        .to_path_buf()
}

pub fn sample_path(rel: &str) -> String {
    workspace_root().join(rel).to_string_lossy().into_owned()
}

pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tol,
        "expected {expected}, got {actual} (diff {diff} > tol {tol})"
    );
}
