//! Unified file reading for workspace scans
//!
//! Provides consistent handling for:
//! - Unreadable files (permissions, deleted mid-scan)
//! - Oversized files
//! - Binary files
//! - Non-UTF-8 files (lossy conversion)

use std::fs;
use std::path::Path;

/// Default maximum file size in bytes (16 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Number of leading bytes inspected for NUL when sniffing binary content
const BINARY_SNIFF_LEN: usize = 8192;

/// Result of reading a file
#[derive(Debug, Clone)]
pub struct FileReadResult {
    /// The file content (if successfully read)
    pub content: Option<String>,

    /// Whether lossy conversion was used
    pub lossy_conversion: bool,

    /// Reason for skipping (if skipped)
    pub skip_reason: Option<String>,
}

impl FileReadResult {
    /// Create a successful read result
    pub fn success(content: String) -> Self {
        Self {
            content: Some(content),
            lossy_conversion: false,
            skip_reason: None,
        }
    }

    /// Create a skipped result
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            content: None,
            lossy_conversion: false,
            skip_reason: Some(reason.into()),
        }
    }

    /// Mark as lossy conversion
    pub fn with_lossy(mut self) -> Self {
        self.lossy_conversion = true;
        self
    }
}

/// Read a text file for scanning; never fails, reports a skip reason instead
pub fn read_file_safe(path: &Path) -> FileReadResult {
    read_file_with_limit(path, DEFAULT_MAX_FILE_SIZE)
}

pub fn read_file_with_limit(path: &Path, max_file_size: u64) -> FileReadResult {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => return FileReadResult::skipped(format!("Cannot read metadata: {}", e)),
    };

    if metadata.len() > max_file_size {
        return FileReadResult::skipped(format!(
            "File size {} exceeds limit {}",
            metadata.len(),
            max_file_size
        ));
    }

    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => return FileReadResult::skipped(format!("Cannot read file: {}", e)),
    };

    let check_len = std::cmp::min(BINARY_SNIFF_LEN, bytes.len());
    if bytes[..check_len].contains(&0) {
        return FileReadResult::skipped("Binary file");
    }

    match String::from_utf8(bytes) {
        Ok(content) => FileReadResult::success(content),
        Err(e) => {
            let content = String::from_utf8_lossy(e.as_bytes()).into_owned();
            FileReadResult::success(content).with_lossy()
        }
    }
}
