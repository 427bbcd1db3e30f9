//! Per-build log sink.
//!
//! The build log is the only place a build's outcome is recorded. It is a
//! plain append-only text file that external viewers tail while the build
//! runs, so every write is flushed before returning.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Prefix used for section banners (`### Compact TTFs with ttx`).
pub const SECTION_PREFIX: &str = "### ";

/// Prefix used for subprocess stderr and recoverable errors.
pub const ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("build log '{0}' is already closed")]
    Closed(PathBuf),
    #[error("writing build log '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Append-only, line-oriented log for one build.
///
/// Writes after [`BuildLog::close`] fail with [`LogError::Closed`]; so does a
/// second `close`.
#[derive(Debug)]
pub struct BuildLog {
    path: PathBuf,
    file: Option<File>,
}

impl BuildLog {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: &Path) -> Result<Self, LogError> {
        Self::open(path, true)
    }

    /// Open the log file at `path` for appending, creating it if missing.
    ///
    /// Used by operations that run after the build, such as dashboard
    /// discovery.
    pub fn append(path: &Path) -> Result<Self, LogError> {
        Self::open(path, false)
    }

    fn open(path: &Path, truncate: bool) -> Result<Self, LogError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| LogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let mut options = OpenOptions::new();
        options.create(true);
        if truncate {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let file = options.open(path).map_err(|source| LogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `text` verbatim.
    pub fn write(&mut self, text: &str) -> Result<(), LogError> {
        self.write_prefixed("", text)
    }

    /// Append `prefix` followed by `text`, then flush.
    pub fn write_prefixed(&mut self, prefix: &str, text: &str) -> Result<(), LogError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| LogError::Closed(self.path.clone()))?;
        let result = file
            .write_all(prefix.as_bytes())
            .and_then(|()| file.write_all(text.as_bytes()))
            .and_then(|()| file.flush());
        result.map_err(|source| LogError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Append raw subprocess output. Invalid UTF-8 is replaced, never fatal.
    pub fn write_bytes(&mut self, prefix: &str, bytes: &[u8]) -> Result<(), LogError> {
        self.write_prefixed(prefix, &String::from_utf8_lossy(bytes))
    }

    /// Write a `### title` banner line.
    pub fn section(&mut self, title: &str) -> Result<(), LogError> {
        self.write_prefixed(SECTION_PREFIX, &format!("{title}\n"))
    }

    /// Write an `Error: message` line for a recoverable problem.
    pub fn error(&mut self, message: &str) -> Result<(), LogError> {
        self.write_prefixed(ERROR_PREFIX, &format!("{message}\n"))
    }

    /// Flush and release the file.
    pub fn close(&mut self) -> Result<(), LogError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| LogError::Closed(self.path.clone()))?;
        file.flush().map_err(|source| LogError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
