use std::path::{Path, PathBuf};

/// Result alias used across the crate.
pub type SeqResult<T> = Result<T, SeqCacheError>;

/// Errors raised by discovery, cache resolution and transcoding.
#[derive(thiserror::Error, Debug)]
pub enum SeqCacheError {
    /// A container, frame file or cache path could not be opened or read.
    #[error("file access error: '{}': {message}", path.display())]
    FileAccess {
        /// Path that failed.
        path: PathBuf,
        /// Underlying failure.
        message: String,
    },

    /// A filename does not follow a recognizable sequence convention.
    #[error("format error: {0}")]
    Format(String),

    /// The per-frame transcode tool failed.
    #[error("external tool error: frame {frame}: {message}")]
    ExternalTool {
        /// Frame number of the failed unit.
        frame: u64,
        /// Exit status and captured stderr.
        message: String,
    },

    /// Invalid or unwritable configuration.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SeqCacheError {
    pub fn file_access(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::FileAccess {
            path: path.as_ref().to_path_buf(),
            message: msg.into(),
        }
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn external_tool(frame: u64, msg: impl Into<String>) -> Self {
        Self::ExternalTool {
            frame,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
