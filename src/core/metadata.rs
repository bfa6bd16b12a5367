/*
 * Reads and writes the structured metadata kept in a scene file's header: the
 * classification tag on line 1 (`//MaterialTag: <tag>`) and the free-text comment on
 * line 2 (`//ShComm: <comment>`). Both lines are optional, single-line and sit
 * directly after the untouched first line, tag before comment. A line with the wrong
 * prefix simply means the field is unset.
 *
 * Writes re-materialize the whole file through `SceneText`, so every line that is not
 * part of the header keeps its bytes and relative order. The positional format sits
 * behind `MetadataCodecOperations` so a different encoding can replace it without
 * touching callers.
 */
use super::models::SceneFileMetadata;
use super::scene_text::{SceneText, is_binary_scene, strip_line_terminator};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

pub const TAG_PREFIX: &str = "//MaterialTag:";
pub const COMMENT_PREFIX: &str = "//ShComm:";
// Private placeholders keeping a multi-line comment on its single header line.
pub const NEWLINE_PLACEHOLDER: &str = "__nwlne__";
pub const CARRIAGE_RETURN_PLACEHOLDER: &str = "__crtrn__";

const TAG_LINE_INDEX: usize = 1;
const COMMENT_LINE_INDEX: usize = 2;

#[derive(Debug)]
pub enum MetadataError {
    Io(io::Error),
    MultilineTag(String),
    BinaryScene(PathBuf),
}

impl From<io::Error> for MetadataError {
    fn from(err: io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(e) => write!(f, "Scene metadata I/O error: {e}"),
            MetadataError::MultilineTag(tag) => {
                write!(f, "Tag {tag:?} spans several lines; tags must be single-line")
            }
            MetadataError::BinaryScene(path) => write!(
                f,
                "Scene {path:?} is a binary scene; metadata is only kept in text scenes"
            ),
        }
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetadataError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;

pub trait MetadataCodecOperations: Send + Sync {
    fn read_tag(&self, scene: &Path) -> Result<Option<String>>;
    fn write_tag(&self, scene: &Path, tag: &str) -> Result<()>;
    fn read_comment(&self, scene: &Path) -> Result<Option<String>>;
    fn write_comment(&self, scene: &Path, comment: &str) -> Result<()>;

    fn read_metadata(&self, scene: &Path) -> Result<SceneFileMetadata> {
        Ok(SceneFileMetadata {
            tag: self.read_tag(scene)?,
            comment: self.read_comment(scene)?,
        })
    }
}

// The positional sentinel-line codec used by existing library files.
pub struct SentinelMetadataCodec {}

impl SentinelMetadataCodec {
    pub fn new() -> Self {
        SentinelMetadataCodec {}
    }
}

impl Default for SentinelMetadataCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataCodecOperations for SentinelMetadataCodec {
    fn read_tag(&self, scene: &Path) -> Result<Option<String>> {
        ensure_text_scene(scene)?;
        let line = read_header_line(scene, TAG_LINE_INDEX)?;
        Ok(line.and_then(|l| sentinel_value(&l, TAG_PREFIX)))
    }

    fn write_tag(&self, scene: &Path, tag: &str) -> Result<()> {
        ensure_text_scene(scene)?;
        if tag.contains(|c| c == '\n' || c == '\r') {
            return Err(MetadataError::MultilineTag(tag.to_string()));
        }
        log::trace!("MetadataCodec: Writing tag {tag:?} to {scene:?}");
        let mut header = SceneHeader::split(SceneText::read(scene)?, HeaderField::Tag);
        header.tag_slot = Some(sentinel_line(TAG_PREFIX, tag, header.terminator));
        header.assemble().write_atomically(scene)?;
        log::debug!("MetadataCodec: Wrote tag {tag:?} to {scene:?}");
        Ok(())
    }

    fn read_comment(&self, scene: &Path) -> Result<Option<String>> {
        ensure_text_scene(scene)?;
        let line = read_header_line(scene, COMMENT_LINE_INDEX)?;
        Ok(line
            .and_then(|l| sentinel_value(&l, COMMENT_PREFIX))
            .map(|raw| unescape_comment(&raw)))
    }

    fn write_comment(&self, scene: &Path, comment: &str) -> Result<()> {
        ensure_text_scene(scene)?;
        log::trace!("MetadataCodec: Writing comment to {scene:?}");
        let mut header = SceneHeader::split(SceneText::read(scene)?, HeaderField::Comment);
        header.comment_slot = Some(sentinel_line(
            COMMENT_PREFIX,
            &escape_comment(comment),
            header.terminator,
        ));
        header.assemble().write_atomically(scene)?;
        log::debug!(
            "MetadataCodec: Wrote {}-character comment to {scene:?}",
            comment.chars().count()
        );
        Ok(())
    }
}

fn ensure_text_scene(scene: &Path) -> Result<()> {
    if is_binary_scene(scene) {
        return Err(MetadataError::BinaryScene(scene.to_path_buf()));
    }
    Ok(())
}

// Reads lines up to `index` only; the header is at the top of possibly large files.
fn read_header_line(scene: &Path, index: usize) -> io::Result<Option<Vec<u8>>> {
    let mut reader = BufReader::new(File::open(scene)?);
    let mut line = Vec::new();
    for _ in 0..=index {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
    }
    Ok(Some(line))
}

/*
 * Returns the value of a sentinel line: the text after the prefix and one optional
 * separating space, without the line terminator. `None` when the prefix is absent.
 */
fn sentinel_value(line: &[u8], prefix: &str) -> Option<String> {
    let text = String::from_utf8_lossy(strip_line_terminator(line));
    let value = text.strip_prefix(prefix)?;
    Some(value.strip_prefix(' ').unwrap_or(value).to_string())
}

fn sentinel_line(prefix: &str, value: &str, terminator: &[u8]) -> Vec<u8> {
    let mut line = format!("{prefix} {value}").into_bytes();
    line.extend_from_slice(terminator);
    line
}

fn is_blank(line: &[u8]) -> bool {
    strip_line_terminator(line)
        .iter()
        .all(|b| *b == b' ' || *b == b'\t')
}

fn escape_comment(comment: &str) -> String {
    comment
        .replace('\n', NEWLINE_PLACEHOLDER)
        .replace('\r', CARRIAGE_RETURN_PLACEHOLDER)
}

fn unescape_comment(raw: &str) -> String {
    raw.replace(CARRIAGE_RETURN_PLACEHOLDER, "\r")
        .replace(NEWLINE_PLACEHOLDER, "\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderField {
    Tag,
    Comment,
}

/*
 * A scene file split into its header slots and the remaining body lines.
 *
 * Line 1 occupies the tag slot when it is a tag sentinel or blank (a blank line is an
 * empty placeholder). Line 2 occupies the comment slot when it is a comment sentinel,
 * or, while writing a comment, when it is blank. Every other line stays in the body in
 * its original order, so content found between the first line and an existing comment
 * moves below the header instead of pushing the comment out of position.
 */
struct SceneHeader {
    first: Vec<u8>,
    tag_slot: Option<Vec<u8>>,
    comment_slot: Option<Vec<u8>>,
    body: Vec<Vec<u8>>,
    terminator: &'static [u8],
}

impl SceneHeader {
    fn split(scene: SceneText, writing: HeaderField) -> Self {
        let terminator = scene.line_terminator();
        let mut lines = scene.into_lines().into_iter();
        let first = lines.next().unwrap_or_default();
        let mut tag_slot = None;
        let mut comment_slot = None;
        let mut body = Vec::new();

        for (offset, line) in lines.enumerate() {
            let index = offset + 1;
            if index == TAG_LINE_INDEX
                && (sentinel_value(&line, TAG_PREFIX).is_some() || is_blank(&line))
            {
                tag_slot = Some(line);
            } else if index == COMMENT_LINE_INDEX
                && (sentinel_value(&line, COMMENT_PREFIX).is_some()
                    || (writing == HeaderField::Comment && is_blank(&line)))
            {
                comment_slot = Some(line);
            } else {
                body.push(line);
            }
        }

        SceneHeader {
            first,
            tag_slot,
            comment_slot,
            body,
            terminator,
        }
    }

    fn assemble(self) -> SceneText {
        let mut lines = Vec::with_capacity(self.body.len() + 3);
        lines.push(self.first);
        match (self.tag_slot, &self.comment_slot) {
            (Some(tag), _) => lines.push(tag),
            // A comment needs line 1 held, even without a tag.
            (None, Some(_)) => lines.push(self.terminator.to_vec()),
            (None, None) => {}
        }
        if let Some(comment) = self.comment_slot {
            lines.push(comment);
        }
        lines.extend(self.body);

        // Lines moved in front of others must not run into them.
        let last = lines.len() - 1;
        for line in &mut lines[..last] {
            if !line.ends_with(b"\n") {
                line.extend_from_slice(self.terminator);
            }
        }
        SceneText::from_lines(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn scene_with(content: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("steel.ma");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn lines_of(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_tag_then_comment_on_file_with_blank_header_lines() -> Result<()> {
        let (_dir, path) = scene_with("reqs maya;\n\n\n");
        let codec = SentinelMetadataCodec::new();

        codec.write_tag(&path, "Metal")?;
        assert_eq!(lines_of(&path), vec!["reqs maya;", "//MaterialTag: Metal", ""]);

        codec.write_comment(&path, "ok")?;
        assert_eq!(
            lines_of(&path),
            vec!["reqs maya;", "//MaterialTag: Metal", "//ShComm: ok"]
        );

        assert_eq!(codec.read_tag(&path)?, Some("Metal".to_string()));
        assert_eq!(codec.read_comment(&path)?, Some("ok".to_string()));
        Ok(())
    }

    #[test]
    fn test_write_tag_inserts_before_content_and_preserves_rest() -> Result<()> {
        let body = "//Maya ASCII 2020 scene\nrequires maya \"2020\";\ncreateNode lambert -n \"l1\";\n";
        let (_dir, path) = scene_with(body);
        let codec = SentinelMetadataCodec::new();

        codec.write_tag(&path, "Stone")?;

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "//Maya ASCII 2020 scene\n//MaterialTag: Stone\nrequires maya \"2020\";\ncreateNode lambert -n \"l1\";\n"
        );
        Ok(())
    }

    #[test]
    fn test_write_tag_replaces_existing_tag_and_is_idempotent() -> Result<()> {
        let (_dir, path) = scene_with("head\n//MaterialTag: Wood\nbody\n");
        let codec = SentinelMetadataCodec::new();

        codec.write_tag(&path, "Metal")?;
        let once = fs::read(&path).unwrap();
        codec.write_tag(&path, "Metal")?;

        assert_eq!(fs::read(&path).unwrap(), once);
        assert_eq!(lines_of(&path), vec!["head", "//MaterialTag: Metal", "body"]);
        Ok(())
    }

    #[test]
    fn test_write_tag_keeps_existing_comment_at_line_two() -> Result<()> {
        // Layout left behind when a comment was written before any tag existed.
        let (_dir, path) = scene_with("head\nrequires maya;\n//ShComm: keep me\nbody\n");
        let codec = SentinelMetadataCodec::new();

        codec.write_tag(&path, "Rubber")?;

        assert_eq!(
            lines_of(&path),
            vec![
                "head",
                "//MaterialTag: Rubber",
                "//ShComm: keep me",
                "requires maya;",
                "body"
            ]
        );
        assert_eq!(codec.read_comment(&path)?, Some("keep me".to_string()));
        Ok(())
    }

    #[test]
    fn test_write_comment_without_tag_holds_tag_slot() -> Result<()> {
        let (_dir, path) = scene_with("head\nrequires maya;\n");
        let codec = SentinelMetadataCodec::new();

        codec.write_comment(&path, "first")?;
        assert_eq!(
            lines_of(&path),
            vec!["head", "", "//ShComm: first", "requires maya;"]
        );
        assert_eq!(codec.read_tag(&path)?, None);

        codec.write_tag(&path, "Paper")?;
        assert_eq!(
            lines_of(&path),
            vec![
                "head",
                "//MaterialTag: Paper",
                "//ShComm: first",
                "requires maya;"
            ]
        );
        Ok(())
    }

    #[test]
    fn test_write_comment_replaces_existing_comment() -> Result<()> {
        let (_dir, path) = scene_with("head\n//MaterialTag: Wood\n//ShComm: old\nbody\n");
        let codec = SentinelMetadataCodec::new();

        codec.write_comment(&path, "new")?;

        assert_eq!(
            lines_of(&path),
            vec!["head", "//MaterialTag: Wood", "//ShComm: new", "body"]
        );
        Ok(())
    }

    #[test]
    fn test_comment_round_trips_embedded_newlines() -> Result<()> {
        let (_dir, path) = scene_with("head\n//MaterialTag: Wood\nbody\n");
        let codec = SentinelMetadataCodec::new();
        let comment = "line one\nline two\r\n\nlast";

        codec.write_comment(&path, comment)?;

        assert_eq!(lines_of(&path).len(), 4, "Comment must stay on one line.");
        assert_eq!(codec.read_comment(&path)?, Some(comment.to_string()));
        Ok(())
    }

    #[test]
    fn test_comment_round_trips_random_text() -> Result<()> {
        let alphabet: Vec<char> = "ab Z9_-/\"\t\n\réß".chars().collect();
        let mut rng = rand::rng();
        let codec = SentinelMetadataCodec::new();
        let (_dir, path) = scene_with("head\n\n\nbody\n");

        for _ in 0..50 {
            let len = rng.random_range(0..40);
            let comment: String = (0..len)
                .map(|_| alphabet[rng.random_range(0..alphabet.len())])
                .collect();
            codec.write_comment(&path, &comment)?;
            assert_eq!(codec.read_comment(&path)?, Some(comment.clone()));
        }
        assert_eq!(lines_of(&path).last().map(String::as_str), Some("body"));
        Ok(())
    }

    #[test]
    fn test_tag_round_trips_single_line_values() -> Result<()> {
        let (_dir, path) = scene_with("head\nbody\n");
        let codec = SentinelMetadataCodec::new();
        for tag in ["Multilayered/PaintedSurface", "", "  padded  ", "ünïcode"] {
            codec.write_tag(&path, tag)?;
            assert_eq!(codec.read_tag(&path)?, Some(tag.to_string()));
        }
        Ok(())
    }

    #[test]
    fn test_multiline_tag_is_rejected_without_touching_file() {
        let (_dir, path) = scene_with("head\nbody\n");
        let codec = SentinelMetadataCodec::new();

        let result = codec.write_tag(&path, "Metal\nWood");

        assert!(matches!(result, Err(MetadataError::MultilineTag(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "head\nbody\n");
    }

    #[test]
    fn test_wrong_prefix_reads_as_absent() -> Result<()> {
        let (_dir, path) = scene_with("head\n//Material: Metal\n// ShComm: x\n");
        let codec = SentinelMetadataCodec::new();
        assert_eq!(
            codec.read_metadata(&path)?,
            SceneFileMetadata {
                tag: None,
                comment: None
            }
        );
        Ok(())
    }

    #[test]
    fn test_short_files_read_as_absent_and_accept_writes() -> Result<()> {
        let (_dir, path) = scene_with("only line");
        let codec = SentinelMetadataCodec::new();
        assert_eq!(codec.read_tag(&path)?, None);
        assert_eq!(codec.read_comment(&path)?, None);

        codec.write_tag(&path, "Wood")?;
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "only line\n//MaterialTag: Wood\n"
        );
        Ok(())
    }

    #[test]
    fn test_empty_file_gets_empty_first_line() -> Result<()> {
        let (_dir, path) = scene_with("");
        let codec = SentinelMetadataCodec::new();

        codec.write_comment(&path, "c")?;

        assert_eq!(fs::read_to_string(&path).unwrap(), "\n\n//ShComm: c\n");
        assert_eq!(codec.read_comment(&path)?, Some("c".to_string()));
        Ok(())
    }

    #[test]
    fn test_crlf_files_keep_their_terminator() -> Result<()> {
        let (_dir, path) = scene_with("head\r\nbody\r\n");
        let codec = SentinelMetadataCodec::new();

        codec.write_tag(&path, "Wood")?;

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "head\r\n//MaterialTag: Wood\r\nbody\r\n"
        );
        assert_eq!(codec.read_tag(&path)?, Some("Wood".to_string()));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let codec = SentinelMetadataCodec::new();
        let missing = Path::new("this_scene_does_not_exist_hopefully.ma");
        assert!(matches!(codec.read_tag(missing), Err(MetadataError::Io(_))));
        assert!(matches!(
            codec.write_comment(missing, "x"),
            Err(MetadataError::Io(_))
        ));
    }

    #[test]
    fn test_binary_scene_is_refused() {
        let (dir, _path) = scene_with("x");
        let binary = dir.path().join("steel.mb");
        fs::write(&binary, b"\x00\x01binary").unwrap();
        let codec = SentinelMetadataCodec::new();

        assert!(matches!(
            codec.write_tag(&binary, "Metal"),
            Err(MetadataError::BinaryScene(_))
        ));
        assert_eq!(fs::read(&binary).unwrap(), b"\x00\x01binary");
    }
}
