use crate::core::{
    self, AssetChain, AssetScannerOperations, Catalog, Category, ConfigError,
    ConfigManagerOperations, DirectoryAssignment, DirectoryEntry, FileSystemError, IconRenderer,
    LibrarySnapshot, MetadataCodecOperations, MetadataError, Origin, RelinkError, RelinkReport,
    SceneExporter, SceneFileMetadata, SceneImporter, TextureRelinkerOperations, file_system,
    scene_text,
};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// Name of the per-asset folder that relinked textures are copied into.
pub const TEXTURE_DIR_NAME: &str = "textures";
const ICON_SUFFIX: &str = "_icon.png";
const PUBLISH_EXTENSION: &str = "ma";

#[derive(Debug)]
pub enum LibraryError {
    Config(ConfigError),
    Metadata(MetadataError),
    Relink(RelinkError),
    FileSystem(FileSystemError),
    Io(io::Error),
    AssetNotFound(String),
    AmbiguousAsset { query: String, matches: Vec<String> },
    VersionNotFound { asset: String, index: usize },
    NoIcon(String),
    InvalidFileName(String),
    Export { target: PathBuf, source: io::Error },
    Import { scene: PathBuf, source: io::Error },
    Render { icon: PathBuf, source: io::Error },
}

impl From<ConfigError> for LibraryError {
    fn from(err: ConfigError) -> Self {
        LibraryError::Config(err)
    }
}

impl From<MetadataError> for LibraryError {
    fn from(err: MetadataError) -> Self {
        LibraryError::Metadata(err)
    }
}

impl From<RelinkError> for LibraryError {
    fn from(err: RelinkError) -> Self {
        LibraryError::Relink(err)
    }
}

impl From<FileSystemError> for LibraryError {
    fn from(err: FileSystemError) -> Self {
        LibraryError::FileSystem(err)
    }
}

impl From<io::Error> for LibraryError {
    fn from(err: io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Config(e) => write!(f, "{e}"),
            LibraryError::Metadata(e) => write!(f, "{e}"),
            LibraryError::Relink(e) => write!(f, "{e}"),
            LibraryError::FileSystem(e) => write!(f, "{e}"),
            LibraryError::Io(e) => write!(f, "I/O error: {e}"),
            LibraryError::AssetNotFound(query) => write!(f, "No asset matches '{query}'"),
            LibraryError::AmbiguousAsset { query, matches } => write!(
                f,
                "'{query}' matches several assets ({}); use project/name",
                matches.join(", ")
            ),
            LibraryError::VersionNotFound { asset, index } => {
                write!(f, "Asset '{asset}' has no version {}", index + 1)
            }
            LibraryError::NoIcon(asset) => write!(f, "Asset '{asset}' doesn't have an icon"),
            LibraryError::InvalidFileName(name) => write!(
                f,
                "'{name}' is not a valid scene file name (expected <name>.{PUBLISH_EXTENSION})"
            ),
            LibraryError::Export { target, source } => {
                write!(f, "Export to {target:?} failed: {source}")
            }
            LibraryError::Import { scene, source } => {
                write!(f, "Import of {scene:?} failed: {source}")
            }
            LibraryError::Render { icon, source } => {
                write!(f, "Rendering icon {icon:?} failed: {source}")
            }
        }
    }
}

impl std::error::Error for LibraryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LibraryError::Config(e) => Some(e),
            LibraryError::Metadata(e) => Some(e),
            LibraryError::Relink(e) => Some(e),
            LibraryError::FileSystem(e) => Some(e),
            LibraryError::Io(e) => Some(e),
            LibraryError::Export { source, .. }
            | LibraryError::Import { source, .. }
            | LibraryError::Render { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;

// Position of one chain inside the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetLocation {
    pub(crate) directory: usize,
    pub(crate) chain: usize,
}

/*
 * Which assets to show. `None` in any field means "All"; `search` is matched
 * case-insensitively against the asset name and its label.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    pub category: Option<Category>,
    pub project: Option<String>,
    pub tag: Option<String>,
    pub search: String,
}

// One row of the asset overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetListing {
    pub project: String,
    pub category: Category,
    pub origin: Origin,
    pub name: String,
    pub label: String,
    pub newest: PathBuf,
    pub version_count: usize,
    pub icon: PathBuf,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub tag: Option<String>,
    pub comment: Option<String>,
    pub relink_textures: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    NewVersion,
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub scene: PathBuf,
    pub relink: Option<RelinkReport>,
}

// Result of a pass over many assets: what worked, and what failed with which error.
#[derive(Debug, Default)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<(String, LibraryError)>,
}

/*
 * The orchestrating layer of the library. It owns the merged catalog and the scanned
 * snapshot as explicit values and drives the core services (each behind its
 * `...Operations` trait) for every workflow. The snapshot is replaced wholesale on
 * refresh; the only targeted updates are the ones a workflow makes right after its
 * change reached the disk.
 */
pub struct LibrarySession {
    pub(crate) config_manager: Arc<dyn ConfigManagerOperations>,
    pub(crate) scanner: Arc<dyn AssetScannerOperations>,
    pub(crate) codec: Arc<dyn MetadataCodecOperations>,
    pub(crate) relinker: Arc<dyn TextureRelinkerOperations>,
    pub(crate) catalog: Catalog,
    pub(crate) snapshot: LibrarySnapshot,
}

impl LibrarySession {
    pub fn new(
        config_manager: Arc<dyn ConfigManagerOperations>,
        scanner: Arc<dyn AssetScannerOperations>,
        codec: Arc<dyn MetadataCodecOperations>,
        relinker: Arc<dyn TextureRelinkerOperations>,
    ) -> Self {
        LibrarySession {
            config_manager,
            scanner,
            codec,
            relinker,
            catalog: Catalog::default(),
            snapshot: LibrarySnapshot::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn snapshot(&self) -> &LibrarySnapshot {
        &self.snapshot
    }

    pub fn init_sources(&self) -> Result<Vec<PathBuf>> {
        Ok(self.config_manager.init_sources()?)
    }

    /*
     * Reads both configuration sources into a new catalog and scans it. An unreadable
     * source leaves the previous catalog and snapshot in place.
     */
    pub fn load(&mut self) -> Result<()> {
        let catalog = self.config_manager.load_catalog()?;
        self.catalog = catalog;
        self.refresh();
        Ok(())
    }

    // Rescans the current catalog and replaces the snapshot.
    pub fn refresh(&mut self) {
        self.snapshot = self.scanner.scan_catalog(&self.catalog);
    }

    /*
     * Persists the edited directory rows (each source rewritten from scratch), then
     * adopts the catalog they describe and rescans it.
     */
    pub fn save_directory_assignments(&mut self, rows: &[DirectoryAssignment]) -> Result<()> {
        let (local, shared) = core::split_assignments(rows);
        self.config_manager.save_sources(&local, &shared)?;
        self.catalog = core::config::merge_sources(&local, &shared);
        log::info!(
            "LibrarySession: Saved {} local and {} shared path(s)",
            local.len(),
            shared.len()
        );
        self.refresh();
        Ok(())
    }

    pub fn directory_assignments(&self) -> Vec<DirectoryAssignment> {
        self.catalog
            .entries()
            .iter()
            .map(DirectoryAssignment::from)
            .collect()
    }

    /*
     * Looks an asset up by folder name, or by `project/name` when the same name exists
     * in several projects.
     */
    pub fn find_asset(&self, query: &str) -> Result<AssetLocation> {
        let (project, name) = match query.rsplit_once('/') {
            Some((project, name)) => (Some(project), name),
            None => (None, query),
        };
        let matches: Vec<AssetLocation> = self
            .snapshot
            .directories
            .iter()
            .enumerate()
            .filter(|(_, dir)| project.is_none_or(|p| dir.entry.project_name() == p))
            .flat_map(|(directory, dir)| {
                dir.chains
                    .iter()
                    .enumerate()
                    .filter(|(_, chain)| chain.name() == name)
                    .map(move |(chain, _)| AssetLocation { directory, chain })
            })
            .collect();

        match matches.as_slice() {
            [] => Err(LibraryError::AssetNotFound(query.to_string())),
            [only] => Ok(*only),
            many => Err(LibraryError::AmbiguousAsset {
                query: query.to_string(),
                matches: many.iter().map(|loc| self.qualified_name(*loc)).collect(),
            }),
        }
    }

    pub fn chain(&self, location: AssetLocation) -> &AssetChain {
        &self.snapshot.directories[location.directory].chains[location.chain]
    }

    pub fn entry(&self, location: AssetLocation) -> &DirectoryEntry {
        &self.snapshot.directories[location.directory].entry
    }

    pub fn qualified_name(&self, location: AssetLocation) -> String {
        format!(
            "{}/{}",
            self.entry(location).project_name(),
            self.chain(location).name()
        )
    }

    pub fn projects(&self) -> Vec<String> {
        let mut projects: Vec<String> = Vec::new();
        for entry in self.catalog.entries() {
            let name = entry.project_name();
            if !projects.contains(&name) {
                projects.push(name);
            }
        }
        projects
    }

    // Every asset matching `filter`, in catalog and listing order. Tags are read fresh.
    pub fn filter_assets(&self, filter: &AssetFilter) -> Vec<AssetListing> {
        let search = filter.search.to_lowercase();
        self.snapshot
            .chains()
            .filter(|(entry, _)| filter.category.is_none_or(|c| entry.category == c))
            .filter(|(entry, _)| {
                filter
                    .project
                    .as_deref()
                    .is_none_or(|p| entry.project_name() == p)
            })
            .filter(|(_, chain)| {
                search.is_empty()
                    || chain.name().to_lowercase().contains(&search)
                    || chain.label().to_lowercase().contains(&search)
            })
            .filter_map(|(entry, chain)| {
                let tag = self.current_tag(chain.newest());
                if let Some(wanted) = filter.tag.as_deref() {
                    if tag.as_deref() != Some(wanted) {
                        return None;
                    }
                }
                Some(AssetListing {
                    project: entry.project_name(),
                    category: entry.category,
                    origin: entry.origin,
                    name: chain.name().to_string(),
                    label: chain.label(),
                    newest: chain.newest().to_path_buf(),
                    version_count: chain.len(),
                    icon: chain.icon_or_default().to_path_buf(),
                    tag,
                })
            })
            .collect()
    }

    // Tag of a scene for display purposes; unreadable scenes count as untagged.
    fn current_tag(&self, scene: &Path) -> Option<String> {
        match self.codec.read_tag(scene) {
            Ok(tag) => tag,
            Err(e) => {
                log::debug!("LibrarySession: No tag for {scene:?}: {e}");
                None
            }
        }
    }

    pub fn read_metadata(&self, query: &str) -> Result<SceneFileMetadata> {
        let location = self.find_asset(query)?;
        Ok(self.codec.read_metadata(self.chain(location).newest())?)
    }

    pub fn set_tag(&self, query: &str, tag: &str) -> Result<()> {
        let location = self.find_asset(query)?;
        self.codec.write_tag(self.chain(location).newest(), tag)?;
        Ok(())
    }

    pub fn set_comment(&self, query: &str, comment: &str) -> Result<()> {
        let location = self.find_asset(query)?;
        self.codec.write_comment(self.chain(location).newest(), comment)?;
        Ok(())
    }

    /*
     * Publishes a new asset: `<library_dir>/<stem>/<file_name>` is exported, its
     * textures are optionally relinked into the asset's texture folder, then tag and
     * comment are written. The library is rescanned afterwards.
     */
    pub fn publish_new_asset(
        &mut self,
        exporter: &dyn SceneExporter,
        library_dir: &Path,
        file_name: &str,
        options: &PublishOptions,
    ) -> Result<ExportOutcome> {
        let stem = publishable_stem(file_name)
            .ok_or_else(|| LibraryError::InvalidFileName(file_name.to_string()))?;
        let asset_dir = library_dir.join(stem);
        fs::create_dir_all(&asset_dir)?;
        let scene = asset_dir.join(file_name);

        exporter
            .export(&scene)
            .map_err(|source| LibraryError::Export {
                target: scene.clone(),
                source,
            })?;
        log::info!("LibrarySession: Published {scene:?}");

        let relink = if options.relink_textures {
            Some(self.relink_scene(&scene)?)
        } else {
            None
        };
        if let Some(tag) = options.tag.as_deref() {
            self.codec.write_tag(&scene, tag)?;
        }
        if let Some(comment) = options.comment.as_deref() {
            self.codec.write_comment(&scene, comment)?;
        }

        self.refresh();
        Ok(ExportOutcome { scene, relink })
    }

    /*
     * Exports the host's current state as the next version of an asset, or over its
     * newest version. The newest version's tag is carried over to the exported file.
     * The session only shows the new version once the export has succeeded.
     */
    pub fn export_new_version(
        &mut self,
        query: &str,
        exporter: &dyn SceneExporter,
        mode: ExportMode,
        relink_textures: bool,
    ) -> Result<ExportOutcome> {
        let location = self.find_asset(query)?;
        let chain = self.chain(location).clone();
        let tag = self.current_tag(chain.newest());

        let target = match mode {
            ExportMode::NewVersion => chain.next_version_name(),
            ExportMode::Overwrite => chain.newest().to_path_buf(),
        };
        if mode == ExportMode::NewVersion && target.exists() {
            log::warn!(
                "LibrarySession: Next version name {target:?} already exists and will be overwritten"
            );
        }

        exporter
            .export(&target)
            .map_err(|source| LibraryError::Export {
                target: target.clone(),
                source,
            })?;
        if let Some(tag) = tag.as_deref() {
            if !scene_text::is_binary_scene(&target) {
                self.codec.write_tag(&target, tag)?;
            }
        }

        // A name collision overwrote a version the chain already holds.
        if mode == ExportMode::NewVersion && !chain.versions().contains(&target) {
            let updated = chain.append_version(target.clone());
            self.snapshot.directories[location.directory].chains[location.chain] = updated;
        }
        log::info!(
            "LibrarySession: Exported {} to {target:?}",
            self.qualified_name(location)
        );

        let relink = if relink_textures {
            Some(self.relink_scene(&target)?)
        } else {
            log::warn!(
                "LibrarySession: Textures will not be copied to the asset folder for {target:?}"
            );
            None
        };
        Ok(ExportOutcome {
            scene: target,
            relink,
        })
    }

    // Copies the textures of an asset's newest version into its texture folder.
    pub fn relink_asset(&self, query: &str) -> Result<RelinkReport> {
        let location = self.find_asset(query)?;
        self.relink_scene(self.chain(location).newest())
    }

    pub fn relink_all(&self) -> BatchOutcome<RelinkReport> {
        let mut outcome = BatchOutcome::default();
        for (entry, chain) in self.snapshot.chains() {
            match self.relink_scene(chain.newest()) {
                Ok(report) => outcome.succeeded.push(report),
                Err(e) => {
                    let name = format!("{}/{}", entry.project_name(), chain.name());
                    log::warn!("LibrarySession: Relinking {name} failed: {e}");
                    outcome.failed.push((name, e));
                }
            }
        }
        outcome
    }

    fn relink_scene(&self, scene: &Path) -> Result<RelinkReport> {
        if scene_text::is_binary_scene(scene) {
            return Err(RelinkError::BinaryScene(scene.to_path_buf()).into());
        }
        let asset_dir = scene.parent().unwrap_or_else(|| Path::new("."));
        let texture_dir = asset_dir.join(TEXTURE_DIR_NAME);
        fs::create_dir_all(&texture_dir)?;
        Ok(self.relinker.relink(scene, &texture_dir)?)
    }

    // Hands one version (newest when `version` is `None`) to the importer.
    pub fn import_version(
        &self,
        query: &str,
        version: Option<usize>,
        importer: &dyn SceneImporter,
    ) -> Result<Vec<String>> {
        let location = self.find_asset(query)?;
        let chain = self.chain(location);
        let scene = match version {
            None => chain.newest(),
            Some(index) => chain
                .versions()
                .get(index)
                .map(PathBuf::as_path)
                .ok_or_else(|| LibraryError::VersionNotFound {
                    asset: self.qualified_name(location),
                    index,
                })?,
        };
        let nodes = importer
            .import(scene)
            .map_err(|source| LibraryError::Import {
                scene: scene.to_path_buf(),
                source,
            })?;
        log::info!(
            "LibrarySession: Imported {scene:?}, {} node(s) created",
            nodes.len()
        );
        Ok(nodes)
    }

    /*
     * Renders `<newest stem>_icon.png` next to the newest version of every asset that
     * has no icon yet. Failures are collected; the pass continues.
     */
    pub fn render_missing_icons(&mut self, renderer: &dyn IconRenderer) -> BatchOutcome<PathBuf> {
        let mut outcome = BatchOutcome::default();
        for directory in 0..self.snapshot.directories.len() {
            for chain in 0..self.snapshot.directories[directory].chains.len() {
                let location = AssetLocation { directory, chain };
                let current = self.chain(location);
                if current.icon_path().is_some() {
                    continue;
                }
                let icon = current
                    .asset_dir()
                    .join(format!("{}{ICON_SUFFIX}", current.label()));
                match renderer.render_icon(current.newest(), &icon) {
                    Ok(()) => {
                        let updated = current.with_icon(Some(icon.clone()));
                        self.snapshot.directories[directory].chains[chain] = updated;
                        outcome.succeeded.push(icon);
                    }
                    Err(source) => {
                        let name = self.qualified_name(location);
                        log::warn!("LibrarySession: No icon rendered for {name}: {source}");
                        outcome
                            .failed
                            .push((name, LibraryError::Render { icon, source }));
                    }
                }
            }
        }
        outcome
    }

    // Removes the whole asset folder, all versions and textures included.
    pub fn delete_asset(&mut self, query: &str) -> Result<PathBuf> {
        let location = self.find_asset(query)?;
        let asset_dir = self.chain(location).asset_dir().to_path_buf();
        file_system::remove_directory(&asset_dir)?;
        self.snapshot.directories[location.directory]
            .chains
            .remove(location.chain);
        Ok(asset_dir)
    }

    pub fn delete_icon(&mut self, query: &str) -> Result<PathBuf> {
        let location = self.find_asset(query)?;
        let chain = self.chain(location);
        let icon = chain
            .icon_path()
            .map(Path::to_path_buf)
            .ok_or_else(|| LibraryError::NoIcon(self.qualified_name(location)))?;
        fs::remove_file(&icon)?;
        let updated = chain.with_icon(None);
        self.snapshot.directories[location.directory].chains[location.chain] = updated;
        log::info!("LibrarySession: Removed icon {icon:?}");
        Ok(icon)
    }

    pub fn copy_directory_tree(&self, source: &Path, destination: &Path) -> Result<PathBuf> {
        Ok(file_system::copy_directory_tree(source, destination)?)
    }
}

// The asset folder name for a publishable scene file name, if it is one.
fn publishable_stem(file_name: &str) -> Option<&str> {
    let path = Path::new(file_name);
    if path.file_name().and_then(|n| n.to_str()) != Some(file_name) {
        return None;
    }
    if path.extension().and_then(|e| e.to_str()) != Some(PUBLISH_EXTENSION) {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
}
