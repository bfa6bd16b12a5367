/*
 * Whole-directory operations on the library: copying a library directory to a new
 * location and removing an asset folder. Errors are specific enough for the caller
 * to tell a bad argument from a failure half way through a copy.
 */
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub enum FileSystemError {
    Io(io::Error),
    Walk(walkdir::Error),
    InvalidPath(PathBuf),
    DestinationExists(PathBuf),
}

impl From<io::Error> for FileSystemError {
    fn from(err: io::Error) -> Self {
        FileSystemError::Io(err)
    }
}

impl From<walkdir::Error> for FileSystemError {
    fn from(err: walkdir::Error) -> Self {
        FileSystemError::Walk(err)
    }
}

impl std::fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSystemError::Io(e) => write!(f, "I/O error: {e}"),
            FileSystemError::Walk(e) => write!(f, "Directory traversal error: {e}"),
            FileSystemError::InvalidPath(p) => write!(f, "Invalid path: {p:?}"),
            FileSystemError::DestinationExists(p) => {
                write!(f, "Destination already exists: {p:?}")
            }
        }
    }
}

impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileSystemError::Io(e) => Some(e),
            FileSystemError::Walk(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FileSystemError>;

/*
 * Copies the directory `source` with everything below it into a new directory of
 * the same name under `destination_parent`. Symbolic links are followed, so the
 * copy holds plain files.
 *
 * Args:
 *   source: The library directory to copy. It must be an existing directory.
 *   destination_parent: The directory that receives the copy.
 *
 * Returns:
 *   The path of the new directory, `destination_parent/<source name>`. Fails with
 *   `DestinationExists` when that path is already taken, and with `InvalidPath`
 *   when `source` is not a directory or the target would lie inside `source`.
 */
pub fn copy_directory_tree(source: &Path, destination_parent: &Path) -> Result<PathBuf> {
    if !source.is_dir() {
        return Err(FileSystemError::InvalidPath(source.to_path_buf()));
    }
    let Some(name) = source.file_name() else {
        return Err(FileSystemError::InvalidPath(source.to_path_buf()));
    };
    let target = destination_parent.join(name);
    if target.exists() {
        return Err(FileSystemError::DestinationExists(target));
    }
    if target.starts_with(source) {
        // Copying a directory into itself would never terminate.
        return Err(FileSystemError::InvalidPath(target));
    }

    let mut copied_files = 0usize;
    for entry in WalkDir::new(source).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| FileSystemError::InvalidPath(entry.path().to_path_buf()))?;
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
            copied_files += 1;
        }
    }
    log::info!("FileSystem: Copied {copied_files} file(s) from {source:?} to {target:?}");
    Ok(target)
}

pub fn remove_directory(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(FileSystemError::InvalidPath(path.to_path_buf()));
    }
    fs::remove_dir_all(path)?;
    log::info!("FileSystem: Removed directory {path:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup_library(base: &Path) -> io::Result<PathBuf> {
        let library = base.join("shaders");
        fs::create_dir_all(library.join("steel").join("textures"))?;
        fs::create_dir_all(library.join("empty_asset"))?;
        fs::write(library.join("steel").join("steel.ma"), "//Maya ASCII\n")?;
        fs::write(library.join("steel").join("steel_icon.png"), [0x89, b'P'])?;
        fs::write(
            library.join("steel").join("textures").join("albedo.png"),
            "pixels",
        )?;
        Ok(library)
    }

    #[test]
    fn test_copy_directory_tree_copies_everything() -> Result<()> {
        let dir = tempdir()?;
        let library = setup_library(dir.path())?;
        let backup = dir.path().join("backup");
        fs::create_dir(&backup)?;

        let target = copy_directory_tree(&library, &backup)?;

        assert_eq!(target, backup.join("shaders"));
        assert_eq!(
            fs::read_to_string(target.join("steel").join("steel.ma"))?,
            "//Maya ASCII\n"
        );
        assert_eq!(
            fs::read(target.join("steel").join("steel_icon.png"))?,
            vec![0x89, b'P']
        );
        assert!(target.join("steel").join("textures").join("albedo.png").is_file());
        assert!(target.join("empty_asset").is_dir());
        assert!(library.join("steel").join("steel.ma").is_file());
        Ok(())
    }

    #[test]
    fn test_copy_refuses_existing_destination() -> Result<()> {
        let dir = tempdir()?;
        let library = setup_library(dir.path())?;
        let backup = dir.path().join("backup");
        fs::create_dir_all(backup.join("shaders"))?;

        assert!(matches!(
            copy_directory_tree(&library, &backup),
            Err(FileSystemError::DestinationExists(_))
        ));
        Ok(())
    }

    #[test]
    fn test_copy_refuses_missing_source_and_self_nesting() -> Result<()> {
        let dir = tempdir()?;
        let library = setup_library(dir.path())?;

        assert!(matches!(
            copy_directory_tree(&dir.path().join("missing"), dir.path()),
            Err(FileSystemError::InvalidPath(_))
        ));
        assert!(matches!(
            copy_directory_tree(&library, &library.join("steel")),
            Err(FileSystemError::InvalidPath(_))
        ));
        Ok(())
    }

    #[test]
    fn test_remove_directory() -> Result<()> {
        let dir = tempdir()?;
        let library = setup_library(dir.path())?;
        let steel = library.join("steel");

        remove_directory(&steel)?;

        assert!(!steel.exists());
        assert!(library.join("empty_asset").is_dir());
        assert!(matches!(
            remove_directory(&steel),
            Err(FileSystemError::InvalidPath(_))
        ));
        Ok(())
    }
}
