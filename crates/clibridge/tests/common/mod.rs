//! Shared test helpers

#![allow(dead_code)]

pub mod fake_transport;

use std::path::PathBuf;

/// Absolute path of a shell stub under `tests/fixtures`
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Command line running a fixture through `sh`
pub fn sh_fixture(name: &str) -> String {
    format!("sh '{}'", fixture(name).display())
}
