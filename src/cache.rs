//! Cache root resolution and the per-sequence, per-layer cache layout.
//!
//! Layout: `<root>/<stem>/<layer>/<stem>_<frame>.<ext>`.

use std::path::{Path, PathBuf};

use crate::foundation::error::{SeqCacheError, SeqResult};
use crate::sequence::FrameNumber;

/// Where the cache lives by default and where the override is persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Root used when the sidecar is absent, unreadable, or points at a missing directory.
    pub default_root: PathBuf,
    /// JSON sidecar holding `{ "CachePath": "<dir>" }`.
    pub sidecar_path: PathBuf,
}

impl CacheConfig {
    pub fn new(default_root: impl Into<PathBuf>, sidecar_path: impl Into<PathBuf>) -> Self {
        Self {
            default_root: default_root.into(),
            sidecar_path: sidecar_path.into(),
        }
    }

    /// Per-user locations: the platform cache dir for data, the config dir for the sidecar.
    pub fn user_default() -> Self {
        let cache = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        let config = dirs::config_dir().unwrap_or_else(|| cache.clone());
        Self {
            default_root: cache.join("seqcache"),
            sidecar_path: config.join("seqcache").join("cache.json"),
        }
    }
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct Sidecar {
    #[serde(rename = "CachePath", default, skip_serializing_if = "Option::is_none")]
    cache_path: Option<PathBuf>,
}

/// Resolves cache directories and file names.
///
/// Resolution only ever creates directories; nothing here deletes or overwrites cached frames
/// except [`CacheLocator::clear_all`].
#[derive(Clone, Debug)]
pub struct CacheLocator {
    cfg: CacheConfig,
}

impl CacheLocator {
    pub fn new(cfg: CacheConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.cfg
    }

    /// Current cache root. The sidecar is re-read on every call.
    pub fn root_dir(&self) -> PathBuf {
        match self.read_sidecar() {
            Some(path) if path.is_dir() => path,
            Some(path) => {
                tracing::debug!(
                    configured = %path.display(),
                    "configured cache root does not exist, using default"
                );
                self.cfg.default_root.clone()
            }
            None => self.cfg.default_root.clone(),
        }
    }

    fn read_sidecar(&self) -> Option<PathBuf> {
        let bytes = std::fs::read(&self.cfg.sidecar_path).ok()?;
        match serde_json::from_slice::<Sidecar>(&bytes) {
            Ok(sidecar) => sidecar.cache_path,
            Err(e) => {
                tracing::warn!(
                    sidecar = %self.cfg.sidecar_path.display(),
                    "ignoring unreadable cache config: {e}"
                );
                None
            }
        }
    }

    /// Point the cache at `root` and persist the choice in the sidecar.
    pub fn set_root(&self, root: impl AsRef<Path>) -> SeqResult<()> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)
            .map_err(|e| SeqCacheError::file_access(root, e.to_string()))?;

        let sidecar = Sidecar {
            cache_path: Some(root.to_path_buf()),
        };
        let json = serde_json::to_vec_pretty(&sidecar)
            .map_err(|e| SeqCacheError::config(format!("failed to encode cache config: {e}")))?;

        if let Some(parent) = self.cfg.sidecar_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SeqCacheError::config(format!(
                    "failed to create config directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
        std::fs::write(&self.cfg.sidecar_path, json).map_err(|e| {
            SeqCacheError::config(format!(
                "failed to write '{}': {e}",
                self.cfg.sidecar_path.display()
            ))
        })?;
        tracing::info!(root = %root.display(), "cache root updated");
        Ok(())
    }

    /// `<root>/<stem>/<layer>/`, created if absent.
    pub fn target_dir(&self, stem: &str, layer: &str) -> SeqResult<PathBuf> {
        let dir = self.layer_dir(stem, layer);
        std::fs::create_dir_all(&dir).map_err(|e| SeqCacheError::file_access(&dir, e.to_string()))?;
        Ok(dir)
    }

    pub fn target_file(
        &self,
        stem: &str,
        layer: &str,
        frame: FrameNumber,
        ext: &str,
    ) -> SeqResult<PathBuf> {
        Ok(self
            .target_dir(stem, layer)?
            .join(frame_file_name(stem, frame, ext)))
    }

    /// Wildcard path over every cached frame of `(stem, layer)`, for sequence-aware players.
    pub fn target_glob(&self, stem: &str, layer: &str, ext: &str) -> SeqResult<PathBuf> {
        Ok(self
            .target_dir(stem, layer)?
            .join(format!("{stem}_*.{ext}")))
    }

    /// Same as [`CacheLocator::target_glob`] in printf convention.
    pub fn target_printf(
        &self,
        stem: &str,
        layer: &str,
        width: usize,
        ext: &str,
    ) -> SeqResult<PathBuf> {
        Ok(self
            .target_dir(stem, layer)?
            .join(format!("{stem}_%0{width}d.{ext}")))
    }

    /// Cached frame files currently on disk for `(stem, layer)`, sorted by name.
    pub fn cached_frames(&self, stem: &str, layer: &str, ext: &str) -> SeqResult<Vec<PathBuf>> {
        let dir = self.layer_dir(stem, layer);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SeqCacheError::file_access(&dir, e.to_string())),
        };

        let prefix = format!("{stem}_");
        let suffix = format!(".{ext}");
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SeqCacheError::file_access(&dir, e.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let is_frame = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
                .is_some_and(|digits| {
                    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
                });
            if is_frame {
                out.push(entry.path());
            }
        }
        out.sort();
        Ok(out)
    }

    /// Remove everything under the cache root. The root directory itself is kept.
    pub fn clear_all(&self) -> SeqResult<()> {
        let root = self.root_dir();
        let entries = match std::fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(SeqCacheError::file_access(&root, e.to_string())),
        };
        for entry in entries {
            let path = entry
                .map_err(|e| SeqCacheError::file_access(&root, e.to_string()))?
                .path();
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            removed.map_err(|e| SeqCacheError::file_access(&path, e.to_string()))?;
        }
        tracing::info!(root = %root.display(), "cache cleared");
        Ok(())
    }

    fn layer_dir(&self, stem: &str, layer: &str) -> PathBuf {
        self.root_dir().join(stem).join(layer)
    }
}

/// `<stem>_<frame>.<ext>`, with the frame padded to its own width.
pub fn frame_file_name(stem: &str, frame: FrameNumber, ext: &str) -> String {
    format!("{stem}_{frame}.{ext}")
}
