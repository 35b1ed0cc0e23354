//! Common test utilities for `Clipferry` integration tests.
//!
//! This module provides shared functionality for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use clipferry_core::clipboard::RetryPolicy;
use clipferry_core::codec::{encode_frame, split};

/// Create a temporary directory for test files.
///
/// The directory will be automatically cleaned up when the returned
/// `TempDir` is dropped.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Generate random bytes for testing.
pub fn random_bytes(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Assert that two files have identical content.
pub fn assert_files_equal(path1: &Path, path2: &Path) {
    let content1 = std::fs::read(path1).expect("Failed to read first file");
    let content2 = std::fs::read(path2).expect("Failed to read second file");
    assert_eq!(content1, content2, "File contents differ");
}

/// Every frame the sender would publish for `data`, in order.
pub fn frames_for(data: &[u8], chunk_size: usize, name: &str) -> Vec<String> {
    let chunks = split(data, chunk_size).expect("valid chunk size");
    let total = u32::try_from(chunks.len()).expect("chunk count fits u32");
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let index = u32::try_from(i + 1).expect("index fits u32");
            encode_frame(chunk, index, total, name, data.len() as u64)
        })
        .collect()
}

/// Retry policy with short delays for tests.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        initial: Duration::from_millis(10),
        max: Duration::from_millis(50),
    }
}
