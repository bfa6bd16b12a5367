/*
 * Path helpers shared by the core: locating the per-user configuration directory,
 * and the string-level path handling used for paths read out of scene files, which
 * may have been written on another platform.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

pub const APP_NAME: &str = "shader_library";
pub const LOCAL_CONFIG_FILENAME: &str = "library_paths.txt";
pub const LOG_FILENAME: &str = "shader_library.log";

/*
 * Retrieves the application's local (non-roaming) configuration directory, creating
 * it when it does not exist yet.
 *
 * Args:
 *   app_name: The name the platform directory is derived from.
 *
 * Returns:
 *   The directory path, or `None` when no home directory can be determined or the
 *   directory cannot be created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Resolving local config dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let config_path = proj_dirs.config_local_dir();
        if !config_path.exists() {
            if let Err(e) = fs::create_dir_all(config_path) {
                log::error!("PathUtils: Failed to create config directory {config_path:?}: {e}");
                return None;
            }
            log::debug!("PathUtils: Created config directory: {config_path:?}");
        }
        Some(config_path.to_path_buf())
    })
}

// Default location of the local path-list source.
pub fn default_local_config_path() -> Option<PathBuf> {
    get_base_app_config_local_dir(APP_NAME).map(|dir| dir.join(LOCAL_CONFIG_FILENAME))
}

pub fn to_forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/*
 * The final component of a path string, splitting on both separator styles so a
 * Windows path read from a scene resolves the same on every platform.
 */
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
