/*
 * The command-line front end: argument definitions and the dispatch from each
 * subcommand to the matching `LibrarySession` workflow. The authoring host is stood
 * in for by `FileCopyExporter`, so exporting means copying a prepared scene file.
 */
use super::library::{
    AssetFilter, AssetListing, ExportMode, LibraryError, LibrarySession, PublishOptions, Result,
};
use crate::core::{
    Category, ConfigError, CoreAssetScanner, CoreConfigManager, CoreTextureRelinker,
    DirectoryAssignment, ExternalCommand, FileCopyExporter, Origin, RelinkReport, STANDARD_TAGS,
    SentinelMetadataCodec, path_utils,
};
use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ALL: &str = "All";

/// Manage a shared library of versioned shading-network assets
#[derive(Parser, Debug)]
#[command(name = "shader_library")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage a shared library of versioned shading-network assets", long_about = None)]
pub struct Cli {
    /// Local path-list file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "SHADER_LIBRARY_LOCAL_CONFIG")]
    pub local_config: Option<PathBuf>,

    /// Shared path-list file, usually on a network share
    #[arg(long, global = true, env = "SHADER_LIBRARY_SHARED_CONFIG")]
    pub shared_config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create missing path-list files
    Init,

    /// Show the merged directory catalog
    Paths {
        #[arg(long)]
        json: bool,
    },

    /// Add a library directory, or change the source(s) it is saved in
    SetPath {
        path: String,
        #[arg(short, long, default_value = "Shader")]
        category: Category,
        #[arg(short, long, default_value = "Local")]
        origin: Origin,
    },

    /// Remove a library directory from both sources
    RemovePath {
        path: String,
        #[arg(short, long, default_value = "Shader")]
        category: Category,
    },

    /// List the projects (last component of each library directory)
    Projects,

    /// List assets, optionally filtered
    List {
        #[arg(short, long)]
        category: Option<Category>,
        #[arg(short, long)]
        project: Option<String>,
        #[arg(short, long)]
        tag: Option<String>,
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(long)]
        json: bool,
    },

    /// Show the version chain of an asset
    Versions { asset: String },

    /// Show an asset's tag, or set it
    Tag { asset: String, tag: Option<String> },

    /// Show an asset's comment, or set it
    Comment {
        asset: String,
        comment: Option<String>,
    },

    /// Copy an asset's textures into its folder and relink the newest version
    Relink { asset: String },

    /// Relink the newest version of every asset
    RelinkAll,

    /// Publish a prepared scene file as a new asset
    Publish {
        /// Library directory to publish into
        library_dir: PathBuf,
        /// Scene file name; the asset folder is named after its stem
        file_name: String,
        /// Prepared scene file to export
        #[arg(long = "from")]
        source: PathBuf,
        #[arg(short, long)]
        tag: Option<String>,
        #[arg(long)]
        comment: Option<String>,
        /// Copy referenced textures into the asset folder
        #[arg(long)]
        relink: bool,
    },

    /// Export a prepared scene file as the next version of an asset
    NewVersion {
        asset: String,
        #[arg(long = "from")]
        source: PathBuf,
        /// Replace the newest version instead of adding one
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        relink: bool,
    },

    /// Import a version of an asset through an external host program
    Import {
        asset: String,
        /// Version number as shown by `versions` (default: newest)
        #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        version: Option<usize>,
        /// Program run as `<program> <scene>`, printing created nodes
        #[arg(long = "with")]
        program: PathBuf,
    },

    /// Render icons for all assets that have none
    RenderIcons {
        /// Program run as `<program> <scene> <icon>`
        #[arg(long = "with")]
        program: PathBuf,
    },

    /// Delete an asset folder with all its versions
    Delete { asset: String },

    /// Delete an asset's icon image
    DeleteIcon { asset: String },

    /// Copy a library directory into another directory
    CopyDir {
        source: PathBuf,
        destination: PathBuf,
    },

    /// List the standard classification tags
    Tags,
}

fn build_session(cli: &Cli) -> Result<LibrarySession> {
    let shared_path = cli
        .shared_config
        .clone()
        .ok_or(ConfigError::NoSharedConfigPath)?;
    let local_path = match &cli.local_config {
        Some(path) => path.clone(),
        None => path_utils::default_local_config_path().ok_or(ConfigError::NoConfigDirectory)?,
    };
    log::debug!("Commands: Local source {local_path:?}, shared source {shared_path:?}");
    Ok(LibrarySession::new(
        Arc::new(CoreConfigManager::new(local_path, shared_path)),
        Arc::new(CoreAssetScanner::new()),
        Arc::new(SentinelMetadataCodec::new()),
        Arc::new(CoreTextureRelinker::new()),
    ))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(io::Error::from)?;
    println!("{text}");
    Ok(())
}

fn print_listing(listing: &AssetListing) {
    println!(
        "{:<12} {:<8} {:<20} v{:<3} {:<28} {}",
        listing.project,
        listing.category,
        listing.name,
        listing.version_count,
        listing.tag.as_deref().unwrap_or("-"),
        listing.newest.display()
    );
}

fn print_relink_report(report: &RelinkReport) {
    println!(
        "{}: {} reference(s), {} relinked, {} failed",
        report.scene.display(),
        report.references_found,
        report.relinked.len(),
        report.failed.len()
    );
    for texture in &report.relinked {
        println!("  {} -> {}", texture.old_path, texture.new_path);
    }
    for failure in &report.failed {
        println!("  FAILED {}: {}", failure.path, failure.reason);
    }
}

// "All" (any case) means no restriction.
fn unless_all(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.eq_ignore_ascii_case(ALL))
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(LibraryError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a file", path.display()),
        )))
    }
}

/*
 * Runs one command. Every command except `init`, `tags` and `copy-dir` loads the
 * catalog first, so an unreadable path list fails the command up front.
 */
pub fn run(cli: Cli) -> Result<()> {
    let mut session = build_session(&cli)?;

    match cli.command {
        Command::Init => {
            for created in session.init_sources()? {
                println!("Created {}", created.display());
            }
        }
        Command::Tags => {
            for tag in STANDARD_TAGS {
                println!("{tag}");
            }
        }
        Command::CopyDir {
            source,
            destination,
        } => {
            let copied = session.copy_directory_tree(&source, &destination)?;
            println!("Copied to {}", copied.display());
        }
        command => {
            session.load()?;
            run_loaded(&mut session, command)?;
        }
    }
    Ok(())
}

fn run_loaded(session: &mut LibrarySession, command: Command) -> Result<()> {
    match command {
        Command::Paths { json } => {
            if json {
                print_json(session.catalog().entries())?;
            } else {
                for entry in session.catalog().entries() {
                    println!(
                        "{:<8} {:<7} {}",
                        entry.category,
                        entry.origin,
                        entry.path.display()
                    );
                }
            }
        }
        Command::SetPath {
            path,
            category,
            origin,
        } => {
            let mut rows = session.directory_assignments();
            match rows
                .iter_mut()
                .find(|row| row.path == path && row.category == category)
            {
                Some(row) => row.origin = origin,
                None => rows.push(DirectoryAssignment::new(path, category, origin)),
            }
            session.save_directory_assignments(&rows)?;
        }
        Command::RemovePath { path, category } => {
            if session.catalog().find(Path::new(&path), category).is_none() {
                log::warn!("Commands: {path} ({category}) is not in the catalog");
                return Ok(());
            }
            let mut rows = session.directory_assignments();
            rows.retain(|row| {
                !(Path::new(&row.path) == Path::new(&path) && row.category == category)
            });
            session.save_directory_assignments(&rows)?;
        }
        Command::Projects => {
            for project in session.projects() {
                println!("{project}");
            }
        }
        Command::List {
            category,
            project,
            tag,
            search,
            json,
        } => {
            let filter = AssetFilter {
                category,
                project: unless_all(project),
                tag: unless_all(tag),
                search,
            };
            let listings = session.filter_assets(&filter);
            if json {
                print_json(&listings)?;
            } else {
                listings.iter().for_each(print_listing);
            }
        }
        Command::Versions { asset } => {
            let location = session.find_asset(&asset)?;
            let chain = session.chain(location);
            for (index, version) in chain.versions().iter().enumerate() {
                println!("{:>4}  {}", index + 1, version.display());
            }
            println!("icon  {}", chain.icon_or_default().display());
        }
        Command::Tag { asset, tag: None } => {
            let metadata = session.read_metadata(&asset)?;
            println!("{}", metadata.tag.unwrap_or_default());
        }
        Command::Tag {
            asset,
            tag: Some(tag),
        } => session.set_tag(&asset, &tag)?,
        Command::Comment {
            asset,
            comment: None,
        } => {
            let metadata = session.read_metadata(&asset)?;
            println!("{}", metadata.comment.unwrap_or_default());
        }
        Command::Comment {
            asset,
            comment: Some(comment),
        } => session.set_comment(&asset, &comment)?,
        Command::Relink { asset } => print_relink_report(&session.relink_asset(&asset)?),
        Command::RelinkAll => {
            let outcome = session.relink_all();
            outcome.succeeded.iter().for_each(print_relink_report);
            for (name, error) in &outcome.failed {
                println!("{name}: {error}");
            }
        }
        Command::Publish {
            library_dir,
            file_name,
            source,
            tag,
            comment,
            relink,
        } => {
            require_file(&source)?;
            let options = PublishOptions {
                tag,
                comment,
                relink_textures: relink,
            };
            let exporter = FileCopyExporter::new(source);
            let outcome =
                session.publish_new_asset(&exporter, &library_dir, &file_name, &options)?;
            println!("Published {}", outcome.scene.display());
            if let Some(report) = &outcome.relink {
                print_relink_report(report);
            }
        }
        Command::NewVersion {
            asset,
            source,
            overwrite,
            relink,
        } => {
            require_file(&source)?;
            let mode = if overwrite {
                ExportMode::Overwrite
            } else {
                ExportMode::NewVersion
            };
            let exporter = FileCopyExporter::new(source);
            let outcome = session.export_new_version(&asset, &exporter, mode, relink)?;
            println!("Exported {}", outcome.scene.display());
            if let Some(report) = &outcome.relink {
                print_relink_report(report);
            }
        }
        Command::Import {
            asset,
            version,
            program,
        } => {
            // Version numbers on the command line start at 1.
            let index = version.map(|number| number - 1);
            let nodes = session.import_version(&asset, index, &ExternalCommand::new(program))?;
            for node in nodes {
                println!("{node}");
            }
        }
        Command::RenderIcons { program } => {
            let outcome = session.render_missing_icons(&ExternalCommand::new(program));
            for icon in &outcome.succeeded {
                println!("Rendered {}", icon.display());
            }
            for (name, error) in &outcome.failed {
                println!("{name}: {error}");
            }
        }
        Command::Delete { asset } => {
            let removed = session.delete_asset(&asset)?;
            println!("Deleted {}", removed.display());
        }
        Command::DeleteIcon { asset } => {
            let removed = session.delete_icon(&asset)?;
            println!("Deleted {}", removed.display());
        }
        Command::Init | Command::Tags | Command::CopyDir { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn cli_for(dir: &Path, args: &[&str]) -> Cli {
        let local = dir.join("local.txt");
        let shared = dir.join("shared.txt");
        let mut argv = vec![
            "shader_library".to_string(),
            "--local-config".to_string(),
            local.to_string_lossy().into_owned(),
            "--shared-config".to_string(),
            shared.to_string_lossy().into_owned(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::try_parse_from([
            "shader_library",
            "list",
            "--category",
            "texture",
            "--tag",
            "Metal",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::List { category, tag, .. } => {
                assert_eq!(category, Some(Category::Texture));
                assert_eq!(tag.as_deref(), Some("Metal"));
            }
            other => panic!("Expected List, got {other:?}"),
        }
        assert!(Cli::try_parse_from(["shader_library", "list", "--category", "Mesh"]).is_err());
    }

    #[test]
    fn test_import_version_starts_at_one() {
        let parse = |version: &str| {
            Cli::try_parse_from([
                "shader_library",
                "import",
                "aurora/steel",
                "--version",
                version,
                "--with",
                "load.sh",
            ])
        };
        assert!(parse("0").is_err());
        match parse("2").unwrap().command {
            Command::Import {
                version, program, ..
            } => {
                assert_eq!(version, Some(2));
                assert_eq!(program, PathBuf::from("load.sh"));
            }
            other => panic!("Expected Import, got {other:?}"),
        }
    }

    #[test]
    fn test_unless_all() {
        assert_eq!(unless_all(Some("all".to_string())), None);
        assert_eq!(unless_all(Some("Wood".to_string())), Some("Wood".to_string()));
        assert_eq!(unless_all(None), None);
    }

    #[test]
    fn test_init_set_path_and_publish_end_to_end() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        let library = root.join("aurora");
        fs::create_dir_all(&library)?;
        let prepared = root.join("prepared.ma");
        fs::write(&prepared, "//Maya ASCII 2020 scene\nrequires maya \"2020\";\n")?;
        let library_arg = library.to_string_lossy().into_owned();
        let prepared_arg = prepared.to_string_lossy().into_owned();

        run(cli_for(root, &["init"]))?;
        run(cli_for(root, &["set-path", &library_arg, "--origin", "both"]))?;
        run(cli_for(
            root,
            &[
                "publish",
                &library_arg,
                "walnut.ma",
                "--from",
                &prepared_arg,
                "--tag",
                "Wood",
            ],
        ))?;
        run(cli_for(root, &["new-version", "walnut", "--from", &prepared_arg]))?;

        assert_eq!(
            fs::read_to_string(root.join("shared.txt"))?,
            format!("# Paths of shader directories:\n\nShader# {library_arg}\n")
        );
        let second = library.join("walnut").join("walnut_0002.ma");
        assert!(second.is_file());
        assert!(fs::read_to_string(&second)?.contains("//MaterialTag: Wood"));

        run(cli_for(root, &["remove-path", &library_arg]))?;
        assert_eq!(
            fs::read_to_string(root.join("local.txt"))?,
            "# Paths of shader directories:\n\n"
        );
        Ok(())
    }

    #[test]
    fn test_missing_shared_config_is_reported() {
        let cli = Cli::try_parse_from(["shader_library", "paths"]).unwrap();
        if cli.shared_config.is_some() {
            // Set through the environment; nothing to check here.
            return;
        }
        assert!(matches!(
            run(cli),
            Err(LibraryError::Config(ConfigError::NoSharedConfigPath))
        ));
    }
}
