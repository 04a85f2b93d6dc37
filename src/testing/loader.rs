//! Test corpus discovery and loading
//!
//! A test is a plain UTF-8 file with the `.test` extension. Files are run in
//! lexicographic file-name order so a given directory always produces the
//! same ordinals.

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// Extension that marks a file as a test
pub const TEST_EXTENSION: &str = "test";

/// A loaded test file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// 1-based position in the sorted listing
    pub ordinal: usize,
    /// File name without directory
    pub file_name: String,
    pub path: PathBuf,
    /// Raw natural-language steps
    pub content: String,
}

/// List the test files in a directory, sorted by file name
///
/// Fails with `DirectoryAccess` if the directory cannot be listed; no
/// partial listing is returned.
pub fn list_test_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::directory_access(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::directory_access(dir, e))?;
        let path = entry.path();

        if path.extension().and_then(|ext| ext.to_str()) != Some(TEST_EXTENSION) {
            continue;
        }
        // Follows symlinks, so a linked test file still counts
        if !path.is_file() {
            continue;
        }
        files.push(path);
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Read a test file's full text
pub fn read_test_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))
}

/// Read a test file into a `TestCase`
pub fn load_test_case(path: &Path, ordinal: usize) -> Result<TestCase> {
    let content = read_test_file(path)?;
    Ok(TestCase {
        ordinal,
        file_name: file_name(path),
        path: path.to_path_buf(),
        content,
    })
}

/// Display name of a test file
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
