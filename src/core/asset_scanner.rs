/*
 * Discovers the assets below one configured library directory. Every immediate
 * subdirectory is one asset; its scene files become the version chain and a png
 * image, when present, becomes its icon. Listings are taken in file-name order and
 * that order is the chain order; versions are never re-sorted by their number.
 */
use super::models::{Catalog, DirectoryEntry, LibrarySnapshot, ScannedDirectory};
use super::version_chain::AssetChain;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SCENE_EXTENSIONS: [&str; 2] = ["ma", "mb"];
pub const ICON_EXTENSION: &str = "png";

pub trait AssetScannerOperations: Send + Sync {
    /*
     * Builds the chains for one catalog entry, one per asset folder holding at least
     * one scene file. A missing or unreadable directory is logged and yields no chains.
     */
    fn scan_entry(&self, entry: &DirectoryEntry) -> Vec<AssetChain>;

    fn scan_catalog(&self, catalog: &Catalog) -> LibrarySnapshot {
        let directories = catalog
            .entries()
            .iter()
            .map(|entry| ScannedDirectory {
                entry: entry.clone(),
                chains: self.scan_entry(entry),
            })
            .collect();
        let snapshot = LibrarySnapshot { directories };
        log::info!(
            "AssetScanner: Found {} asset(s) in {} director(ies)",
            snapshot.chain_count(),
            catalog.len()
        );
        snapshot
    }
}

pub struct CoreAssetScanner {}

impl CoreAssetScanner {
    pub fn new() -> Self {
        CoreAssetScanner {}
    }

    /*
     * Immediate children of `dir` in file-name order. Only a failure to read `dir`
     * itself is an error; a child that cannot be inspected (e.g. a dangling link) is
     * logged and left out.
     */
    fn list_children(dir: &Path) -> walkdir::Result<Vec<walkdir::DirEntry>> {
        let mut children = Vec::new();
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        for entry in walker {
            match entry {
                Ok(child) => children.push(child),
                Err(e) if e.depth() == 0 => return Err(e),
                Err(e) => {
                    log::warn!(
                        "AssetScanner: Skipping {:?} in {dir:?}: {e}",
                        e.path().unwrap_or(dir)
                    );
                }
            }
        }
        Ok(children)
    }

    fn scan_asset_dir(asset_dir: &Path) -> Option<AssetChain> {
        let children = match Self::list_children(asset_dir) {
            Ok(children) => children,
            Err(e) => {
                log::warn!("AssetScanner: Asset folder {asset_dir:?} could not be listed: {e}");
                return None;
            }
        };

        let mut versions: Vec<PathBuf> = Vec::new();
        let mut icon: Option<PathBuf> = None;
        for child in children.iter().filter(|c| c.file_type().is_file()) {
            let path = child.path();
            let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if SCENE_EXTENSIONS.contains(&extension) {
                versions.push(path.to_path_buf());
            } else if extension == ICON_EXTENSION {
                // Last one in listing order wins.
                icon = Some(path.to_path_buf());
            }
        }

        let name = asset_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let chain = AssetChain::from_versions(name, versions, icon);
        if chain.is_none() {
            log::trace!("AssetScanner: {asset_dir:?} holds no scene files, skipped");
        }
        chain
    }
}

impl Default for CoreAssetScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetScannerOperations for CoreAssetScanner {
    fn scan_entry(&self, entry: &DirectoryEntry) -> Vec<AssetChain> {
        let children = match Self::list_children(&entry.path) {
            Ok(children) => children,
            Err(e) => {
                log::warn!(
                    "AssetScanner: Path {:?} was not found or is unreadable! {e}",
                    entry.path
                );
                return Vec::new();
            }
        };

        let chains: Vec<AssetChain> = children
            .iter()
            .filter(|child| child.file_type().is_dir())
            .filter_map(|child| Self::scan_asset_dir(child.path()))
            .collect();
        log::debug!(
            "AssetScanner: {} asset(s) in {:?} ({})",
            chains.len(),
            entry.path,
            entry.category
        );
        chains
    }
}
