/*
 * This module consolidates the core, platform-agnostic logic of the shading-asset
 * library. It re-exports the data model and the core services (each behind an
 * `...Operations` trait so callers and tests can substitute them): configuration
 * merging, asset scanning, version chains, scene-header metadata, texture
 * relinking, and the collaborator interfaces to the authoring host.
 */
pub mod asset_scanner;
pub mod checksum_utils;
pub mod collaborators;
pub mod config;
pub mod file_system;
pub mod metadata;
pub mod models;
pub mod path_utils;
pub mod scene_text;
pub mod texture_relinker;
pub mod version_chain;

// Re-export key structures and enums
pub use models::{
    Catalog, Category, DirectoryEntry, LibrarySnapshot, Origin, STANDARD_TAGS, ScannedDirectory,
    SceneFileMetadata, SourcePath,
};
pub use version_chain::AssetChain;

pub use asset_scanner::{AssetScannerOperations, CoreAssetScanner};

pub use config::{
    ConfigError, ConfigManagerOperations, CoreConfigManager, DirectoryAssignment,
    split_assignments,
};

pub use file_system::FileSystemError;

pub use metadata::{MetadataCodecOperations, MetadataError, SentinelMetadataCodec};

pub use texture_relinker::{
    CoreTextureRelinker, RelinkError, RelinkReport, TextureRelinkerOperations,
};

pub use collaborators::{
    ExternalCommand, FileCopyExporter, IconRenderer, SceneExporter, SceneImporter,
};
