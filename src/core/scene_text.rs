/*
 * A line-oriented, byte-preserving view of a text scene file. Lines keep their own
 * terminators, so a file that is read, partially edited and written back differs
 * from the original only in the lines that were edited. All writers go through
 * `write_file_atomically`: the complete replacement is written to a temporary file
 * next to the target and then renamed over it, so a crash leaves either the old or
 * the new file, never a truncated one.
 */
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

// Extension of the binary scene format, which the line-based tools must not touch.
pub const BINARY_SCENE_EXTENSION: &str = "mb";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneText {
    lines: Vec<Vec<u8>>,
}

impl SceneText {
    pub fn read(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        SceneText {
            lines: bytes
                .split_inclusive(|b| *b == b'\n')
                .map(<[u8]>::to_vec)
                .collect(),
        }
    }

    pub fn from_lines(lines: Vec<Vec<u8>>) -> Self {
        SceneText { lines }
    }

    pub fn into_lines(self) -> Vec<Vec<u8>> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    // The raw line, terminator included.
    pub fn line(&self, index: usize) -> Option<&[u8]> {
        self.lines.get(index).map(Vec::as_slice)
    }

    // The line content as UTF-8 without its terminator; `None` for invalid UTF-8.
    pub fn line_text(&self, index: usize) -> Option<&str> {
        self.line(index)
            .and_then(|line| std::str::from_utf8(strip_line_terminator(line)).ok())
    }

    pub fn set_line(&mut self, index: usize, line: Vec<u8>) {
        self.lines[index] = line;
    }

    /*
     * The terminator used for newly written lines: `\r\n` when the first line uses it,
     * `\n` otherwise.
     */
    pub fn line_terminator(&self) -> &'static [u8] {
        match self.lines.first() {
            Some(first) if first.ends_with(b"\r\n") => b"\r\n",
            _ => b"\n",
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.lines.concat()
    }

    pub fn write_atomically(&self, path: &Path) -> io::Result<()> {
        write_file_atomically(path, &self.to_bytes())
    }
}

pub fn strip_line_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

pub fn is_binary_scene(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(BINARY_SCENE_EXTENSION))
}

/*
 * Replaces `path` with `contents` in one step. The temporary file is created in the
 * target's directory so the final rename never crosses file systems, and it takes
 * over the permissions of the file it replaces.
 */
pub fn write_file_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(contents)?;
    temp_file.as_file().sync_all()?;
    if let Ok(existing) = fs::metadata(path) {
        temp_file.as_file().set_permissions(existing.permissions())?;
    }
    temp_file.persist(path).map_err(|e| e.error)?;
    log::trace!(
        "SceneText: Atomically wrote {} bytes to {path:?}",
        contents.len()
    );
    Ok(())
}
