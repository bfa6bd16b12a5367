/*
 * Interfaces to the authoring host that produces and consumes scene files. The
 * library never looks inside these operations; it only decides where their output
 * goes and what happens to the file afterwards.
 */
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

// Serializes the host's current selection to a scene file at `target`.
pub trait SceneExporter {
    fn export(&self, target: &Path) -> io::Result<()>;
}

// Loads a scene file into the host and returns the identifiers of the created nodes.
pub trait SceneImporter {
    fn import(&self, scene: &Path) -> io::Result<Vec<String>>;
}

// Renders a preview of `scene` and stores it as an image at `icon`.
pub trait IconRenderer {
    fn render_icon(&self, scene: &Path, icon: &Path) -> io::Result<()>;
}

/*
 * Exports by copying an already prepared scene file. This is what the command line
 * uses in place of a running host.
 */
pub struct FileCopyExporter {
    source: PathBuf,
}

impl FileCopyExporter {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        FileCopyExporter {
            source: source.into(),
        }
    }
}

impl SceneExporter for FileCopyExporter {
    fn export(&self, target: &Path) -> io::Result<()> {
        fs::copy(&self.source, target)?;
        log::debug!(
            "FileCopyExporter: Exported {:?} to {target:?}",
            self.source
        );
        Ok(())
    }
}

/*
 * Importer and icon renderer backed by an external program, e.g. a batch script that
 * drives the authoring host. The importer runs `<program> <scene>` and takes every
 * non-empty stdout line as a created node; the renderer runs
 * `<program> <scene> <icon>` and expects the icon file to exist afterwards.
 */
pub struct ExternalCommand {
    program: PathBuf,
}

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ExternalCommand {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&Path]) -> io::Result<String> {
        let output = Command::new(&self.program).args(args).output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SceneImporter for ExternalCommand {
    fn import(&self, scene: &Path) -> io::Result<Vec<String>> {
        let stdout = self.run(&[scene])?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl IconRenderer for ExternalCommand {
    fn render_icon(&self, scene: &Path, icon: &Path) -> io::Result<()> {
        self.run(&[scene, icon])?;
        if !icon.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} did not produce {}", self.program.display(), icon.display()),
            ));
        }
        Ok(())
    }
}
