use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::version_chain::AssetChain;

/*
 * The classification vocabulary offered when tagging an asset. Tags are stored as
 * free strings in the scene header, so this list is advisory only.
 */
pub const STANDARD_TAGS: [&str; 12] = [
    "Undefined",
    "Metal",
    "Multilayered/PaintedSurface",
    "Refractive",
    "Rubber",
    "Stone",
    "Wood",
    "Paper",
    "Textile",
    "Plastic",
    "Organic",
    "Volume",
];

// Which library tab a configured directory belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    Shader,
    Texture,
    Asset,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Shader => "Shader",
            Category::Texture => "Texture",
            Category::Asset => "Asset",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shader" => Ok(Category::Shader),
            "texture" => Ok(Category::Texture),
            "asset" => Ok(Category::Asset),
            other => Err(format!(
                "unknown category '{other}' (expected Shader, Texture or Asset)"
            )),
        }
    }
}

// Which configuration source(s) a directory was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Origin {
    Local,
    Shared,
    Both,
}

impl Origin {
    pub fn in_local(self) -> bool {
        matches!(self, Origin::Local | Origin::Both)
    }

    pub fn in_shared(self) -> bool {
        matches!(self, Origin::Shared | Origin::Both)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Local => "Local",
            Origin::Shared => "Shared",
            Origin::Both => "Both",
        })
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Origin::Local),
            "shared" => Ok(Origin::Shared),
            "both" => Ok(Origin::Both),
            other => Err(format!(
                "unknown origin '{other}' (expected Local, Shared or Both)"
            )),
        }
    }
}

/*
 * One `<category># <path>` line of a configuration source. The pair is the identity
 * of a configured directory; the same pair in both sources becomes one `Both` entry.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourcePath {
    pub path: PathBuf,
    pub category: Category,
}

impl SourcePath {
    pub fn new(path: impl Into<PathBuf>, category: Category) -> Self {
        SourcePath {
            path: path.into(),
            category,
        }
    }
}

/*
 * A configured library directory after merging both sources.
 * The origin is derived once from set membership and never changes afterwards.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub path: PathBuf,
    pub category: Category,
    pub origin: Origin,
}

impl DirectoryEntry {
    pub fn new(source: SourcePath, origin: Origin) -> Self {
        DirectoryEntry {
            path: source.path,
            category: source.category,
            origin,
        }
    }

    /*
     * The project name shown for assets in this directory: the last component of
     * the configured path, or the whole path when it has no final component.
     */
    pub fn project_name(&self) -> String {
        project_name_of(&self.path)
    }
}

pub(crate) fn project_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/*
 * The merged directory catalog. It is an explicit value owned by the orchestrating
 * layer and is replaced wholesale on every reload, never patched in place.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    entries: Vec<DirectoryEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Catalog { entries }
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, path: &Path, category: Category) -> Option<&DirectoryEntry> {
        self.entries
            .iter()
            .find(|entry| entry.path == path && entry.category == category)
    }
}

// One catalog entry together with the asset chains found in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedDirectory {
    pub entry: DirectoryEntry,
    pub chains: Vec<AssetChain>,
}

/*
 * The scanned state of the whole catalog. Like the catalog, it is rebuilt on
 * every refresh; the only in-place edits are the ones a workflow makes right after
 * it changed the disk (appending an exported version, dropping a deleted asset).
 */
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibrarySnapshot {
    pub directories: Vec<ScannedDirectory>,
}

impl LibrarySnapshot {
    pub fn chain_count(&self) -> usize {
        self.directories.iter().map(|dir| dir.chains.len()).sum()
    }

    pub fn chains(&self) -> impl Iterator<Item = (&DirectoryEntry, &AssetChain)> {
        self.directories
            .iter()
            .flat_map(|dir| dir.chains.iter().map(move |chain| (&dir.entry, chain)))
    }
}

// Structured metadata carried in a scene file's header lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SceneFileMetadata {
    pub tag: Option<String>,
    pub comment: Option<String>,
}
