use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::foundation::error::{SeqCacheError, SeqResult};

/// Pixel encoding of a single channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKind {
    Half,
    Float,
    Uint,
}

/// Raw channel record read from a container header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelEntry {
    /// Dotted channel name, e.g. `beauty.R`.
    pub name: String,
    pub sample: SampleKind,
    /// Horizontal and vertical subsampling factors.
    pub sampling: (usize, usize),
}

impl ChannelEntry {
    pub fn float(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sample: SampleKind::Float,
            sampling: (1, 1),
        }
    }
}

/// Anything that can list the channels stored in a container file.
pub trait ChannelSource: Send + Sync {
    fn read_channels(&self, path: &Path) -> SeqResult<Vec<ChannelEntry>>;
}

/// Reads channel lists from OpenEXR headers.
///
/// Only the header is parsed; no pixel data is decoded.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExrChannelSource {
    /// Reject files with minor header inconsistencies instead of tolerating them.
    pub pedantic: bool,
}

impl ChannelSource for ExrChannelSource {
    fn read_channels(&self, path: &Path) -> SeqResult<Vec<ChannelEntry>> {
        let meta = exr::meta::MetaData::read_from_file(path, self.pedantic)
            .map_err(|e| SeqCacheError::file_access(path, e.to_string()))?;

        let mut out = Vec::new();
        for header in meta.headers.iter() {
            // Multi-part files may name the part instead of prefixing each channel.
            let part = header
                .own_attributes
                .layer_name
                .as_ref()
                .map(|t| t.to_string());
            for ch in header.channels.list.iter() {
                let raw = ch.name.to_string();
                let name = match &part {
                    Some(part) if !raw.contains('.') => format!("{part}.{raw}"),
                    _ => raw,
                };
                let sample = match ch.sample_type {
                    exr::meta::attribute::SampleType::F16 => SampleKind::Half,
                    exr::meta::attribute::SampleType::F32 => SampleKind::Float,
                    exr::meta::attribute::SampleType::U32 => SampleKind::Uint,
                };
                out.push(ChannelEntry {
                    name,
                    sample,
                    sampling: (ch.sampling.0, ch.sampling.1),
                });
            }
        }
        Ok(out)
    }
}

/// Canned channel lists keyed by path.
///
/// Unknown paths fail the same way an unreadable file would.
#[derive(Clone, Debug, Default)]
pub struct FixedChannelSource {
    entries: HashMap<PathBuf, Vec<ChannelEntry>>,
}

impl FixedChannelSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register float channels named `names` for `path`.
    pub fn with_channels<I, S>(mut self, path: impl Into<PathBuf>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(
            path.into(),
            names.into_iter().map(ChannelEntry::float).collect(),
        );
        self
    }
}

impl ChannelSource for FixedChannelSource {
    fn read_channels(&self, path: &Path) -> SeqResult<Vec<ChannelEntry>> {
        self.entries
            .get(path)
            .cloned()
            .ok_or_else(|| SeqCacheError::file_access(path, "no such container"))
    }
}
