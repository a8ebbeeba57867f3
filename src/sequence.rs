//! Frame-number extraction and sequence pattern inference from a single sample path.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::foundation::error::{SeqCacheError, SeqResult};

/// Separators that may precede the frame-number run.
const SEPARATORS: [char; 3] = ['_', '.', '-'];

/// Cache file extension used when the source frames have none.
const FALLBACK_EXT: &str = "exr";

/// Frame number together with the digit width it was written with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameNumber {
    pub value: u64,
    pub width: usize,
}

impl FrameNumber {
    pub fn new(value: u64, width: usize) -> Self {
        Self { value, width }
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.value, width = self.width)
    }
}

/// Naming pattern of an on-disk frame sequence.
///
/// `prefix` keeps the separator in front of the frame run and `suffix` holds everything after
/// it, extension included. For `shot01_0100.exr` that is `shot01_` / `.exr` with width 4.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceDescriptor {
    pub directory: PathBuf,
    pub prefix: String,
    pub suffix: String,
    pub padding: usize,
    /// Extension without the dot; empty when the sample has none.
    pub extension: String,
    /// Frame number of the sample the descriptor was derived from.
    pub sample_frame: FrameNumber,
}

impl SequenceDescriptor {
    /// File-name pattern with `*` in place of the frame run, e.g. `shot01_*.exr`.
    pub fn glob_pattern(&self) -> String {
        format!("{}*{}", self.prefix, self.suffix)
    }

    /// File-name pattern in printf convention, e.g. `shot01_%04d.exr`.
    pub fn printf_pattern(&self) -> String {
        format!("{}%0{}d{}", self.prefix, self.padding, self.suffix)
    }

    /// Sequence stem: the prefix without its trailing separator.
    pub fn stem(&self) -> &str {
        match self.prefix.strip_suffix(SEPARATORS) {
            Some(s) if !s.is_empty() => s,
            _ => &self.prefix,
        }
    }

    /// Extension for cached frames: the source's own, or `exr` when it has none.
    pub fn cache_extension(&self) -> &str {
        match self.extension.as_str() {
            "" => FALLBACK_EXT,
            ext => ext,
        }
    }

    pub fn frame_path(&self, frame: u64) -> PathBuf {
        self.directory.join(format!(
            "{}{:0width$}{}",
            self.prefix,
            frame,
            self.suffix,
            width = self.padding
        ))
    }

    /// List the sequence members present in `directory`, ascending by frame number.
    ///
    /// Only files whose wildcard portion is made of digits are members. Several files can map to
    /// the same frame number (`shot_05.exr`, `shot_005.exr`); all of them are returned and ties
    /// are ordered by path.
    pub fn enumerate(&self) -> SeqResult<Vec<(FrameNumber, PathBuf)>> {
        let dir = self.directory.to_str().ok_or_else(|| {
            SeqCacheError::file_access(&self.directory, "directory path is not valid UTF-8")
        })?;
        let pattern = format!(
            "{}/{}*{}",
            glob::Pattern::escape(dir),
            glob::Pattern::escape(&self.prefix),
            glob::Pattern::escape(&self.suffix)
        );
        let paths = glob::glob(&pattern)
            .map_err(|e| SeqCacheError::format(format!("invalid sequence pattern: {e}")))?;

        let mut out = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| SeqCacheError::file_access(e.path(), e.to_string()))?;
            if !path.is_file() {
                continue;
            }
            if let Some(frame) = self.member_frame(&path) {
                out.push((frame, path));
            }
        }
        out.sort_by(|a, b| a.0.value.cmp(&b.0.value).then_with(|| a.1.cmp(&b.1)));
        Ok(out)
    }

    fn member_frame(&self, path: &Path) -> Option<FrameNumber> {
        let name = path.file_name()?.to_str()?;
        let digits = name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value = digits.parse::<u64>().ok()?;
        Some(FrameNumber::new(value, digits.len()))
    }
}

struct SplitName<'a> {
    stem: &'a str,
    extension: Option<&'a str>,
    /// Byte range of the last digit run in `stem`.
    run: Option<(usize, usize)>,
}

fn not_member(path: &Path) -> SeqCacheError {
    SeqCacheError::format(format!(
        "'{}' is not a recognizable sequence member",
        path.display()
    ))
}

fn split_name(path: &Path) -> SeqResult<SplitName<'_>> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| not_member(path))?;
    let extension = path.extension().and_then(|s| s.to_str());

    let bytes = stem.as_bytes();
    let run = bytes.iter().rposition(u8::is_ascii_digit).map(|last| {
        let start = bytes[..last]
            .iter()
            .rposition(|b| !b.is_ascii_digit())
            .map_or(0, |i| i + 1);
        (start, last + 1)
    });

    Ok(SplitName {
        stem,
        extension,
        run,
    })
}

/// Extract the frame number from a sequence member's file name.
///
/// The frame number is the last run of digits in the name without extension.
pub fn frame_number(path: impl AsRef<Path>) -> SeqResult<FrameNumber> {
    let path = path.as_ref();
    let split = split_name(path)?;
    let (start, end) = split.run.ok_or_else(|| not_member(path))?;
    let digits = &split.stem[start..end];
    let value = digits.parse::<u64>().map_err(|e| {
        SeqCacheError::format(format!(
            "frame number '{digits}' in '{}' is out of range: {e}",
            path.display()
        ))
    })?;
    Ok(FrameNumber::new(value, digits.len()))
}

/// Derive the sequence naming pattern from one sample frame path.
///
/// The frame run must be preceded by `_`, `.` or `-`; the separator is kept in the prefix.
#[tracing::instrument(level = "debug")]
pub fn resolve(sample: &Path) -> SeqResult<SequenceDescriptor> {
    let sample_frame = frame_number(sample)?;
    let split = split_name(sample)?;
    let (start, end) = split.run.ok_or_else(|| not_member(sample))?;

    let separated = split.stem[..start]
        .chars()
        .next_back()
        .is_some_and(|c| SEPARATORS.contains(&c));
    if !separated {
        return Err(SeqCacheError::format(format!(
            "'{}' is not a recognizable sequence member (frame number must follow one of '_', '.', '-')",
            sample.display()
        )));
    }

    let mut suffix = split.stem[end..].to_string();
    if let Some(ext) = split.extension {
        suffix.push('.');
        suffix.push_str(ext);
    }

    let directory = match sample.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok(SequenceDescriptor {
        directory,
        prefix: split.stem[..start].to_string(),
        suffix,
        padding: sample_frame.width,
        extension: split.extension.unwrap_or_default().to_string(),
        sample_frame,
    })
}

#[cfg(test)]
#[path = "../tests/unit/sequence/resolve.rs"]
mod tests;
