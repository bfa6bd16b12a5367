/*
 * Finds the texture files a scene references, copies them next to the asset and
 * points the scene at the copies.
 *
 * A node-definition block opens on a line starting with `createNode <type>` and
 * continues over the following tab-indented lines; the first line without a leading
 * tab (or the end of the file) closes it. Inside `file` blocks the `setAttr ".ftn"`
 * line carries the texture path as its last quoted token. Only that token is
 * rewritten; every other byte of the scene stays as it was.
 */
use super::checksum_utils;
use super::path_utils;
use super::scene_text::{SceneText, is_binary_scene, strip_line_terminator};
use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

const NODE_DEFINITION_KEYWORD: &str = "createNode";
pub const FILE_TEXTURE_NODE_TYPE: &str = "file";
pub const TEXTURE_PATH_ATTRIBUTE: &str = "setAttr \".ftn\"";
const STRING_TYPE_FLAG: &str = "-type \"string\"";

#[derive(Debug)]
pub enum RelinkError {
    Io(io::Error),
    BinaryScene(PathBuf),
}

impl From<io::Error> for RelinkError {
    fn from(err: io::Error) -> Self {
        RelinkError::Io(err)
    }
}

impl std::fmt::Display for RelinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelinkError::Io(e) => write!(f, "Scene I/O error while relinking textures: {e}"),
            RelinkError::BinaryScene(path) => {
                write!(f, "Cannot relink textures in binary scene {path:?}")
            }
        }
    }
}

impl std::error::Error for RelinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelinkError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelinkError>;

// A node-definition block: `start_line` holds `createNode`, `end_line` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBlock {
    pub node_type: String,
    pub start_line: usize,
    pub end_line: usize,
}

// A texture path found in a scene; recomputed on every pass, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureReference {
    pub line_index: usize,
    pub path: String,
    span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelinkedTexture {
    pub line_index: usize,
    pub old_path: String,
    pub new_path: String,
    pub copied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTextureCopy {
    pub line_index: usize,
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelinkReport {
    pub scene: PathBuf,
    pub references_found: usize,
    pub relinked: Vec<RelinkedTexture>,
    pub failed: Vec<FailedTextureCopy>,
}

impl RelinkReport {
    // True when the scene file was rewritten.
    pub fn has_changes(&self) -> bool {
        !self.relinked.is_empty()
    }
}

pub trait TextureRelinkerOperations: Send + Sync {
    /*
     * Copies every texture referenced by `scene` into `destination_dir` and rewrites
     * the references that were copied. Failed copies are reported and leave their
     * line untouched; copies that already succeeded are not rolled back. The scene is
     * only written when at least one line changed.
     */
    fn relink(&self, scene: &Path, destination_dir: &Path) -> Result<RelinkReport>;
}

pub struct CoreTextureRelinker {}

impl CoreTextureRelinker {
    pub fn new() -> Self {
        CoreTextureRelinker {}
    }
}

impl Default for CoreTextureRelinker {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureRelinkerOperations for CoreTextureRelinker {
    fn relink(&self, scene_path: &Path, destination_dir: &Path) -> Result<RelinkReport> {
        if is_binary_scene(scene_path) {
            return Err(RelinkError::BinaryScene(scene_path.to_path_buf()));
        }
        let mut scene = SceneText::read(scene_path)?;
        let references = find_texture_references(&scene);
        let mut report = RelinkReport {
            scene: scene_path.to_path_buf(),
            references_found: references.len(),
            ..RelinkReport::default()
        };

        for reference in references {
            let new_path = relinked_path(destination_dir, &reference.path);
            if new_path == reference.path {
                log::debug!(
                    "TextureRelinker: {} already points into {destination_dir:?}",
                    reference.path
                );
                continue;
            }
            match copy_texture(Path::new(&reference.path), Path::new(&new_path)) {
                Ok(copied) => {
                    let line = rewrite_reference(&scene, &reference, &new_path);
                    scene.set_line(reference.line_index, line);
                    report.relinked.push(RelinkedTexture {
                        line_index: reference.line_index,
                        old_path: reference.path,
                        new_path,
                        copied,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "TextureRelinker: {} cannot be copied! {e}",
                        path_utils::base_name(&reference.path)
                    );
                    report.failed.push(FailedTextureCopy {
                        line_index: reference.line_index,
                        path: reference.path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !report.has_changes() {
            if report.references_found == 0 {
                log::warn!(
                    "TextureRelinker: No textures found in {scene_path:?}. No changes will be written."
                );
            } else {
                log::warn!(
                    "TextureRelinker: Nothing to relink in {scene_path:?}. No changes will be written."
                );
            }
            return Ok(report);
        }

        scene.write_atomically(scene_path)?;
        log::info!(
            "TextureRelinker: Relinked {} of {} texture(s) in {scene_path:?} to {destination_dir:?}",
            report.relinked.len(),
            report.references_found
        );
        Ok(report)
    }
}

enum BlockScan {
    OutsideBlock,
    InBlock { node_type: String, start_line: usize },
}

/*
 * Splits the scene into node-definition blocks. Lines outside any block (the header,
 * `connectAttr` statements and so on) belong to none. The final block runs to the end
 * of the file when no unindented line follows it.
 */
pub fn find_node_blocks(scene: &SceneText) -> Vec<NodeBlock> {
    let mut blocks = Vec::new();
    let mut state = BlockScan::OutsideBlock;

    for index in 0..scene.len() {
        let line = scene.line(index).unwrap_or_default();
        if line.starts_with(b"\t") {
            continue;
        }
        if let BlockScan::InBlock {
            node_type,
            start_line,
        } = std::mem::replace(&mut state, BlockScan::OutsideBlock)
        {
            blocks.push(NodeBlock {
                node_type,
                start_line,
                end_line: index,
            });
        }
        if let Some(node_type) = node_definition_type(line) {
            state = BlockScan::InBlock {
                node_type,
                start_line: index,
            };
        }
    }

    if let BlockScan::InBlock {
        node_type,
        start_line,
    } = state
    {
        blocks.push(NodeBlock {
            node_type,
            start_line,
            end_line: scene.len(),
        });
    }
    blocks
}

fn node_definition_type(line: &[u8]) -> Option<String> {
    let rest = line.strip_prefix(NODE_DEFINITION_KEYWORD.as_bytes())?;
    if !rest.first().is_some_and(|b| *b == b' ' || *b == b'\t') {
        return None;
    }
    let rest = String::from_utf8_lossy(rest);
    rest.split_whitespace()
        .next()
        .map(|token| token.trim_end_matches(';').to_string())
}

pub fn find_texture_references(scene: &SceneText) -> Vec<TextureReference> {
    find_node_blocks(scene)
        .into_iter()
        .filter(|block| block.node_type == FILE_TEXTURE_NODE_TYPE)
        .flat_map(|block| (block.start_line + 1)..block.end_line)
        .filter_map(|line_index| {
            let text = scene.line_text(line_index)?;
            let span = texture_path_span(text)?;
            Some(TextureReference {
                line_index,
                path: text[span.clone()].to_string(),
                span,
            })
        })
        .collect()
}

/*
 * Locates the last quoted token of a `setAttr ".ftn"` line. The token has to come
 * after the attribute name and its `-type "string"` flag, so a line whose value was
 * continued on the next line yields nothing instead of the type name.
 */
fn texture_path_span(line: &str) -> Option<Range<usize>> {
    let attribute_at = line.find(TEXTURE_PATH_ATTRIBUTE)?;
    let mut earliest = attribute_at + TEXTURE_PATH_ATTRIBUTE.len();
    if let Some(flag_at) = line[earliest..].find(STRING_TYPE_FLAG) {
        earliest += flag_at + STRING_TYPE_FLAG.len();
    }
    let close = line.rfind('"')?;
    let open = line[..close].rfind('"')?;
    if open < earliest || open + 1 == close {
        return None;
    }
    Some(open + 1..close)
}

// Where a texture ends up: its base name inside `destination_dir`, forward slashes.
pub fn relinked_path(destination_dir: &Path, old_path: &str) -> String {
    let joined = destination_dir.join(path_utils::base_name(old_path));
    path_utils::to_forward_slashes(&joined.to_string_lossy())
}

fn rewrite_reference(scene: &SceneText, reference: &TextureReference, new_path: &str) -> Vec<u8> {
    let raw = scene.line(reference.line_index).unwrap_or_default();
    let content = strip_line_terminator(raw);
    let terminator = &raw[content.len()..];
    let mut line = Vec::with_capacity(raw.len() + new_path.len());
    line.extend_from_slice(&content[..reference.span.start]);
    line.extend_from_slice(new_path.as_bytes());
    line.extend_from_slice(&content[reference.span.end..]);
    line.extend_from_slice(terminator);
    line
}

/*
 * Copies a texture to `destination`. Returns `false` when the destination already is
 * the source or already holds identical content, in which case nothing is copied.
 */
fn copy_texture(source: &Path, destination: &Path) -> io::Result<bool> {
    fs::metadata(source)?;
    if destination.exists() {
        let same_file = fs::canonicalize(source)? == fs::canonicalize(destination)?;
        if same_file || checksum_utils::files_have_same_content(source, destination)? {
            log::debug!("TextureRelinker: {destination:?} already holds {source:?}, copy skipped");
            return Ok(false);
        }
    }
    fs::copy(source, destination)?;
    log::debug!("TextureRelinker: Copied {source:?} to {destination:?}");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn scene_from(lines: &[&str]) -> SceneText {
        let mut text = lines.join("\n");
        text.push('\n');
        SceneText::from_bytes(text.as_bytes())
    }

    fn file_node(name: &str, texture: &str) -> String {
        format!(
            "createNode file -n \"{name}\";\n\
             \trename -uid \"5F2A\";\n\
             \tsetAttr \".ftn\" -type \"string\" \"{texture}\";\n\
             \tsetAttr \".cs\" -type \"string\" \"sRGB\";\n"
        )
    }

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        scene: PathBuf,
        destination: PathBuf,
    }

    fn fixture(scene_body: impl FnOnce(&Path) -> String) -> Fixture {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let destination = root.join("asset").join("textures");
        fs::create_dir_all(&destination).unwrap();
        fs::create_dir_all(root.join("sources")).unwrap();
        let scene = root.join("asset").join("steel.ma");
        fs::write(&scene, scene_body(&root)).unwrap();
        Fixture {
            _dir: dir,
            root,
            scene,
            destination,
        }
    }

    fn slash(path: &Path) -> String {
        path_utils::to_forward_slashes(&path.to_string_lossy())
    }

    #[test]
    fn test_blocks_end_at_first_unindented_line() {
        let scene = scene_from(&[
            "//Maya ASCII 2020 scene",
            "requires maya \"2020\";",
            "createNode lambert -n \"l1\";",
            "\tsetAttr \".c\" -type \"float3\" 1 0 0 ;",
            "createNode file -n \"file1\";",
            "\tsetAttr \".ftn\" -type \"string\" \"/t/a.png\";",
            "connectAttr \"file1.oc\" \"l1.c\";",
            "createNode place2dTexture -n \"p1\";",
        ]);

        let blocks = find_node_blocks(&scene);

        assert_eq!(
            blocks,
            vec![
                NodeBlock {
                    node_type: "lambert".to_string(),
                    start_line: 2,
                    end_line: 4
                },
                NodeBlock {
                    node_type: "file".to_string(),
                    start_line: 4,
                    end_line: 6
                },
                NodeBlock {
                    node_type: "place2dTexture".to_string(),
                    start_line: 7,
                    end_line: 8
                },
            ]
        );
    }

    #[test]
    fn test_terminal_block_runs_to_end_of_file() {
        let scene = scene_from(&[
            "createNode lambert -n \"l1\";",
            "createNode file -n \"file1\";",
            "\tsetAttr \".cs\" -type \"string\" \"sRGB\";",
            "\tsetAttr \".ftn\" -type \"string\" \"/t/last.png\";",
        ]);

        let references = find_texture_references(&scene);

        assert_eq!(references.len(), 1);
        assert_eq!(references[0].line_index, 3);
        assert_eq!(references[0].path, "/t/last.png");
    }

    #[test]
    fn test_only_file_blocks_are_considered() {
        let scene = scene_from(&[
            "createNode fileTexture -n \"x\";",
            "\tsetAttr \".ftn\" -type \"string\" \"/t/not_me.png\";",
            "createNode file2 -n \"y\";",
            "\tsetAttr \".ftn\" -type \"string\" \"/t/nor_me.png\";",
            "createNodeX file -n \"z\";",
            "\tsetAttr \".ftn\" -type \"string\" \"/t/nope.png\";",
        ]);
        assert!(find_texture_references(&scene).is_empty());
    }

    #[test]
    fn test_path_span_needs_a_value_token() {
        assert_eq!(
            texture_path_span("\t\tsetAttr \".ftn\" -type \"string\" \"C:/tex/wood.png\";"),
            Some(31..46)
        );
        assert_eq!(texture_path_span("\tsetAttr \".ftn\" -type \"string\""), None);
        assert_eq!(
            texture_path_span("\tsetAttr \".ftn\" -type \"string\" \"\";"),
            None
        );
        assert_eq!(texture_path_span("\tsetAttr \".cs\" \"sRGB\";"), None);
    }

    #[test]
    fn test_relinked_path_uses_base_name_and_forward_slashes() {
        assert_eq!(
            relinked_path(Path::new("/lib/steel/textures"), "C:\\src\\tex\\wood.png"),
            "/lib/steel/textures/wood.png"
        );
        assert_eq!(
            relinked_path(Path::new("/lib/steel/textures"), "/mnt/tex/wood.png"),
            "/lib/steel/textures/wood.png"
        );
    }

    #[test]
    fn test_relink_copies_and_rewrites_all_references() -> Result<()> {
        let fx = fixture(|root| {
            let a = root.join("sources").join("albedo.png");
            let b = root.join("sources").join("rough.png");
            fs::write(&a, b"albedo").unwrap();
            fs::write(&b, b"rough").unwrap();
            format!(
                "//Maya ASCII 2020 scene\n{}{}connectAttr \"file1.oc\" \"l1.c\";\n",
                file_node("file1", &slash(&a)),
                file_node("file2", &slash(&b))
            )
        });

        let report = CoreTextureRelinker::new().relink(&fx.scene, &fx.destination)?;

        assert_eq!(report.references_found, 2);
        assert_eq!(report.relinked.len(), 2);
        assert!(report.failed.is_empty());
        assert!(report.relinked.iter().all(|r| r.copied));
        assert_eq!(fs::read(fx.destination.join("albedo.png")).unwrap(), b"albedo");
        assert_eq!(fs::read(fx.destination.join("rough.png")).unwrap(), b"rough");

        let expected = format!(
            "//Maya ASCII 2020 scene\n{}{}connectAttr \"file1.oc\" \"l1.c\";\n",
            file_node("file1", &slash(&fx.destination.join("albedo.png"))),
            file_node("file2", &slash(&fx.destination.join("rough.png")))
        );
        assert_eq!(fs::read_to_string(&fx.scene).unwrap(), expected);
        Ok(())
    }

    #[test]
    fn test_scene_without_texture_nodes_is_left_byte_identical() -> Result<()> {
        let body = "//Maya ASCII 2020 scene\r\ncreateNode lambert -n \"l1\";\r\n\tsetAttr \".c\" 1;\r\n";
        let fx = fixture(|_| body.to_string());
        let before = fs::metadata(&fx.scene).unwrap().modified().unwrap();

        let report = CoreTextureRelinker::new().relink(&fx.scene, &fx.destination)?;

        assert!(!report.has_changes());
        assert_eq!(report.references_found, 0);
        assert_eq!(fs::read_to_string(&fx.scene).unwrap(), body);
        assert_eq!(fs::metadata(&fx.scene).unwrap().modified().unwrap(), before);
        Ok(())
    }

    #[test]
    fn test_failed_copy_keeps_original_path() -> Result<()> {
        let fx = fixture(|root| {
            let present = root.join("sources").join("present.png");
            fs::write(&present, b"here").unwrap();
            let missing = root.join("sources").join("missing.png");
            format!(
                "head\n{}{}",
                file_node("file1", &slash(&missing)),
                file_node("file2", &slash(&present))
            )
        });
        let missing = slash(&fx.root.join("sources").join("missing.png"));

        let report = CoreTextureRelinker::new().relink(&fx.scene, &fx.destination)?;

        assert_eq!(report.relinked.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, missing);
        let written = fs::read_to_string(&fx.scene).unwrap();
        assert!(written.contains(&format!("\"{missing}\"")));
        assert!(written.contains(&slash(&fx.destination.join("present.png"))));
        assert!(!fx.destination.join("missing.png").exists());
        Ok(())
    }

    #[test]
    fn test_all_copies_failing_writes_nothing() -> Result<()> {
        let fx = fixture(|root| {
            format!(
                "head\n{}",
                file_node("file1", &slash(&root.join("sources").join("gone.png")))
            )
        });
        let before = fs::read(&fx.scene).unwrap();

        let report = CoreTextureRelinker::new().relink(&fx.scene, &fx.destination)?;

        assert!(!report.has_changes());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(fs::read(&fx.scene).unwrap(), before);
        Ok(())
    }

    #[test]
    fn test_identical_texture_at_destination_is_not_copied() -> Result<()> {
        let fx = fixture(|root| {
            let src = root.join("sources").join("albedo.png");
            fs::write(&src, b"same").unwrap();
            format!("head\n{}", file_node("file1", &slash(&src)))
        });
        fs::write(fx.destination.join("albedo.png"), b"same").unwrap();

        let report = CoreTextureRelinker::new().relink(&fx.scene, &fx.destination)?;

        assert_eq!(report.relinked.len(), 1);
        assert!(!report.relinked[0].copied);
        Ok(())
    }

    #[test]
    fn test_reference_already_in_destination_is_unchanged() -> Result<()> {
        let fx = fixture(|root| {
            let dest = root.join("asset").join("textures").join("albedo.png");
            fs::create_dir_all(dest.parent().unwrap()).unwrap();
            fs::write(&dest, b"in place").unwrap();
            format!("head\n{}", file_node("file1", &slash(&dest)))
        });
        let before = fs::read(&fx.scene).unwrap();

        let report = CoreTextureRelinker::new().relink(&fx.scene, &fx.destination)?;

        assert_eq!(report.references_found, 1);
        assert!(!report.has_changes());
        assert_eq!(fs::read(&fx.scene).unwrap(), before);
        assert_eq!(
            fs::read(fx.destination.join("albedo.png")).unwrap(),
            b"in place"
        );
        Ok(())
    }

    #[test]
    fn test_missing_scene_and_binary_scene_are_errors() {
        let dir = tempdir().unwrap();
        let relinker = CoreTextureRelinker::new();
        assert!(matches!(
            relinker.relink(&dir.path().join("missing.ma"), dir.path()),
            Err(RelinkError::Io(_))
        ));
        assert!(matches!(
            relinker.relink(&dir.path().join("steel.mb"), dir.path()),
            Err(RelinkError::BinaryScene(_))
        ));
    }
}
