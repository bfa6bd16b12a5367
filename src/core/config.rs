/*
 * Reads and writes the two path-list sources that make up the library catalog: a
 * local one in the user's configuration directory and a shared one (typically on a
 * network share). Each source is a line-oriented file of `<category># <path>` lines;
 * merging them tags every `(path, category)` pair with the source(s) it came from.
 *
 * Like the rest of the core, the manager sits behind a trait
 * (`ConfigManagerOperations`) so the orchestration layer can be tested against a mock.
 */
use super::models::{Catalog, Category, DirectoryEntry, Origin, SourcePath};
use super::scene_text::write_file_atomically;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CONFIG_HEADER: &str = "# Paths of shader directories:";
const COMMENT_MARKER: char = '#';
const CATEGORY_SEPARATOR: &str = "# ";

#[derive(Debug)]
pub enum ConfigError {
    Unreadable { path: PathBuf, source: io::Error },
    Io(io::Error),
    NoConfigDirectory,
    NoSharedConfigPath,
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Unreadable { path, source } => {
                write!(f, "Configuration source {path:?} is unreadable: {source}")
            }
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::NoConfigDirectory => {
                write!(f, "Could not determine the local configuration directory")
            }
            ConfigError::NoSharedConfigPath => write!(
                f,
                "No shared configuration source given (use --shared-config or SHADER_LIBRARY_SHARED_CONFIG)"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Unreadable { source, .. } => Some(source),
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/*
 * Parses one source. Comment and blank lines are skipped; so are data lines that do
 * not split into a known category and a non-empty path, with a warning naming the
 * file and line. A pair listed twice collapses to its first occurrence.
 */
pub fn parse_source(text: &str, source: &Path) -> Vec<SourcePath> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();
    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(COMMENT_MARKER) {
            continue;
        }
        let Some((category_text, path_text)) = line.split_once(CATEGORY_SEPARATOR) else {
            log::warn!(
                "ConfigMerger: {source:?} line {}: missing '{CATEGORY_SEPARATOR}' separator, line skipped",
                index + 1
            );
            continue;
        };
        let category = match category_text.parse::<Category>() {
            Ok(category) => category,
            Err(e) => {
                log::warn!(
                    "ConfigMerger: {source:?} line {}: {e}, line skipped",
                    index + 1
                );
                continue;
            }
        };
        let path_text = path_text.trim();
        if path_text.is_empty() {
            log::warn!(
                "ConfigMerger: {source:?} line {}: empty path, line skipped",
                index + 1
            );
            continue;
        }
        let entry = SourcePath::new(path_text, category);
        if seen.insert(entry.clone()) {
            paths.push(entry);
        }
    }
    paths
}

/*
 * Merges the two per-source lists into a catalog. Local entries come first in local
 * order, then the shared-only entries in shared order. A pair present in both
 * sources appears once, tagged `Both`.
 */
pub fn merge_sources(local: &[SourcePath], shared: &[SourcePath]) -> Catalog {
    let local_set: HashSet<&SourcePath> = local.iter().collect();
    let shared_set: HashSet<&SourcePath> = shared.iter().collect();
    let mut emitted: HashSet<&SourcePath> = HashSet::new();
    let mut entries = Vec::new();

    for path in local {
        if emitted.insert(path) {
            let origin = if shared_set.contains(path) {
                Origin::Both
            } else {
                Origin::Local
            };
            entries.push(DirectoryEntry::new(path.clone(), origin));
        }
    }
    for path in shared {
        if !local_set.contains(path) && emitted.insert(path) {
            entries.push(DirectoryEntry::new(path.clone(), Origin::Shared));
        }
    }
    Catalog::new(entries)
}

// The complete text of one source: the header, a blank line, one line per entry.
pub fn render_source(paths: &[SourcePath]) -> String {
    let mut text = format!("{CONFIG_HEADER}\n\n");
    for entry in paths {
        text.push_str(&format!(
            "{}{CATEGORY_SEPARATOR}{}\n",
            entry.category,
            entry.path.to_string_lossy()
        ));
    }
    text
}

// One directory row as edited by the user before saving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryAssignment {
    pub path: String,
    pub category: Category,
    pub origin: Origin,
}

impl DirectoryAssignment {
    pub fn new(path: impl Into<String>, category: Category, origin: Origin) -> Self {
        DirectoryAssignment {
            path: path.into(),
            category,
            origin,
        }
    }
}

impl From<&DirectoryEntry> for DirectoryAssignment {
    fn from(entry: &DirectoryEntry) -> Self {
        DirectoryAssignment::new(
            entry.path.to_string_lossy().into_owned(),
            entry.category,
            entry.origin,
        )
    }
}

/*
 * Splits edited rows into the local and shared lists to persist. Rows with a blank
 * path are dropped; a `Both` row goes to each list.
 */
pub fn split_assignments(rows: &[DirectoryAssignment]) -> (Vec<SourcePath>, Vec<SourcePath>) {
    let mut local = Vec::new();
    let mut shared = Vec::new();
    for row in rows {
        let path = row.path.trim();
        if path.is_empty() {
            continue;
        }
        let source_path = SourcePath::new(path, row.category);
        if row.origin.in_local() && !local.contains(&source_path) {
            local.push(source_path.clone());
        }
        if row.origin.in_shared() && !shared.contains(&source_path) {
            shared.push(source_path);
        }
    }
    (local, shared)
}

pub trait ConfigManagerOperations: Send + Sync {
    // Reads both sources and merges them. An unreadable source is an error.
    fn load_catalog(&self) -> Result<Catalog>;
    // Overwrites both sources with exactly the given lists.
    fn save_sources(&self, local: &[SourcePath], shared: &[SourcePath]) -> Result<()>;
    // Creates missing source files containing only the header; returns the created ones.
    fn init_sources(&self) -> Result<Vec<PathBuf>>;
}

pub struct CoreConfigManager {
    local_path: PathBuf,
    shared_path: PathBuf,
}

impl CoreConfigManager {
    pub fn new(local_path: PathBuf, shared_path: PathBuf) -> Self {
        CoreConfigManager {
            local_path,
            shared_path,
        }
    }

    fn read_source(path: &Path) -> Result<Vec<SourcePath>> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let paths = parse_source(&text, path);
        log::debug!(
            "CoreConfigManager: Read {} path(s) from {path:?}",
            paths.len()
        );
        Ok(paths)
    }

    fn write_source(path: &Path, paths: &[SourcePath]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        write_file_atomically(path, render_source(paths).as_bytes())?;
        log::debug!(
            "CoreConfigManager: Wrote {} path(s) to {path:?}",
            paths.len()
        );
        Ok(())
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_catalog(&self) -> Result<Catalog> {
        let local = Self::read_source(&self.local_path)?;
        let shared = Self::read_source(&self.shared_path)?;
        let catalog = merge_sources(&local, &shared);
        log::info!(
            "CoreConfigManager: Catalog has {} director(ies) ({} local, {} shared)",
            catalog.len(),
            local.len(),
            shared.len()
        );
        Ok(catalog)
    }

    fn save_sources(&self, local: &[SourcePath], shared: &[SourcePath]) -> Result<()> {
        Self::write_source(&self.local_path, local)?;
        Self::write_source(&self.shared_path, shared)
    }

    fn init_sources(&self) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for path in [&self.local_path, &self.shared_path] {
            if path.exists() {
                log::debug!("CoreConfigManager: {path:?} already exists, left untouched");
                continue;
            }
            Self::write_source(path, &[])?;
            log::info!("CoreConfigManager: Created empty path list {path:?}");
            created.push(path.clone());
        }
        Ok(created)
    }
}
