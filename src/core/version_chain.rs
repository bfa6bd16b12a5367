/*
 * The in-memory model of one asset's version history. A chain is an ordered, never
 * empty list of scene files (oldest first) plus an optional icon image. Chains are
 * values: appending a version returns a new chain, and the caller decides when the
 * new value is exposed (only after the corresponding export has hit the disk).
 */
use serde::Serialize;
use std::path::{Path, PathBuf};

// Host icon shown for assets that have no rendered icon image yet.
pub const DEFAULT_ICON_NAME: &str = "blinn.svg";

const VERSION_SUFFIX_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetChain {
    name: String,
    versions: Vec<PathBuf>,
    icon_path: Option<PathBuf>,
}

impl AssetChain {
    /*
     * Builds a chain from versions in the order given. Returns `None` for an empty
     * version list, which keeps the non-empty invariant out of every caller's hands.
     */
    pub fn from_versions(
        name: impl Into<String>,
        versions: Vec<PathBuf>,
        icon_path: Option<PathBuf>,
    ) -> Option<Self> {
        if versions.is_empty() {
            return None;
        }
        Some(AssetChain {
            name: name.into(),
            versions,
            icon_path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn versions(&self) -> &[PathBuf] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn newest(&self) -> &Path {
        // Non-empty by construction.
        &self.versions[self.versions.len() - 1]
    }

    pub fn icon_path(&self) -> Option<&Path> {
        self.icon_path.as_deref()
    }

    pub fn icon_or_default(&self) -> &Path {
        self.icon_path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_ICON_NAME))
    }

    // Display label: the newest version's file name without extension.
    pub fn label(&self) -> String {
        self.newest()
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }

    // The asset folder, i.e. the directory holding the newest version.
    pub fn asset_dir(&self) -> &Path {
        self.newest().parent().unwrap_or_else(|| Path::new("."))
    }

    /*
     * Computes the file name for the next version, in the newest version's directory.
     *
     * The sequence number is always `len() + 1`, zero-padded to four digits. It is
     * not derived from the newest file's own number, so a chain whose numbering has
     * gaps (a version was deleted) can produce a name that already exists. When the
     * newest stem does not end in `_NNNN`, the suffix is appended instead of replaced.
     */
    pub fn next_version_name(&self) -> PathBuf {
        let newest = self.newest();
        let stem = newest
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base = strip_version_suffix(&stem).unwrap_or(&stem);
        let mut file_name = format!("{base}_{:04}", self.versions.len() + 1);
        if let Some(extension) = newest.extension() {
            file_name.push('.');
            file_name.push_str(&extension.to_string_lossy());
        }
        match newest.parent() {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    // Returns a new chain with `version` appended as the newest entry.
    pub fn append_version(&self, version: PathBuf) -> AssetChain {
        let mut versions = self.versions.clone();
        versions.push(version);
        AssetChain {
            name: self.name.clone(),
            versions,
            icon_path: self.icon_path.clone(),
        }
    }

    pub fn with_icon(&self, icon_path: Option<PathBuf>) -> AssetChain {
        AssetChain {
            icon_path,
            ..self.clone()
        }
    }
}

/*
 * Returns the stem without its trailing `_NNNN` version suffix, or `None` when the
 * last five characters are not an underscore followed by four ASCII digits.
 */
fn strip_version_suffix(stem: &str) -> Option<&str> {
    let split_at = stem
        .char_indices()
        .rev()
        .nth(VERSION_SUFFIX_LEN - 1)
        .map(|(index, _)| index)?;
    let (base, suffix) = stem.split_at(split_at);
    let digits = suffix.strip_prefix('_')?;
    if digits.len() == VERSION_SUFFIX_LEN - 1 && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(base)
    } else {
        None
    }
}
