//! Image mark parsing
//!
//! A mark is the inline image reference a document line carries, either the
//! bare bracket form `![title](path)` or that form wrapped in an HTML anchor.
//! Parsing records byte-accurate offsets into the trimmed line so the mark can
//! later be rewritten in place. The scanner is deliberately not a regex:
//! offsets must be exact and the anchor wrapper changes which bytes the
//! rewrite has to cover.
//!
//! Only the first mark on a line is discovered; downstream line-based
//! rewriting assumes at most one mark per line.

const MARK_PREFIX: &str = "![";
const MARK_MIDDLE: &str = "](";
const MARK_SUFFIX: char = ')';

const ANCHOR_OPENER: &str = "<a ";
const ANCHOR_CLOSER: &str = "</a>";

/// Identifying substring of the large-picture (lightbox) anchor convention.
const LARGE_PICTURE_TAG: &str = "data-fancybox";
/// Identifying substring of the common (open-in-new-tab) anchor convention.
const COMMON_PICTURE_TAG: &str = "target='_blank'";

const NETWORK_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Where the referenced image lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLocation {
    /// Path is a relative path or bare filename inside the project
    Local,
    /// Path is an absolute URL
    Network,
}

/// Which textual encoding the mark uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
    /// Bare bracket form
    Plain,
    /// Anchor-wrapped, lightbox convention
    LargePicture,
    /// Anchor-wrapped, new-tab convention
    CommonPicture,
    /// Anchor-wrapped without a recognized convention
    CustomHtml,
}

/// One parsed image reference
///
/// Immutable after construction apart from [`uploaded_url`] (set once the
/// image has been migrated; a remote URL after upload, a project-relative
/// path after download migration) and [`rendered_mark`] (the replacement text
/// the relabel stage prepares for write-back).
///
/// [`uploaded_url`]: ImageReference::uploaded_url
/// [`rendered_mark`]: ImageReference::rendered_mark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Name of the document the line came from
    pub source_file_name: String,
    /// Line index as understood by the owning text buffer
    pub line_number: usize,
    /// The trimmed original line
    pub line_text: String,
    /// Exact substring matched, bracket form or the whole anchor-wrapped line
    pub original_mark: String,
    /// Byte offset of the mark's first byte in `line_text`
    pub mark_start: usize,
    /// Byte offset one past the mark's last byte in `line_text`
    pub mark_end: usize,
    pub title: String,
    /// Path exactly as written in the source
    pub path: String,
    /// Basename used for project lookup (empty when the path is empty)
    pub resolved_image_name: String,
    /// Extension without the dot, empty if none
    pub extension: String,
    pub location: ImageLocation,
    pub kind: MarkKind,
    pub uploaded_url: Option<String>,
    pub rendered_mark: Option<String>,
}

impl ImageReference {
    pub fn is_local(&self) -> bool {
        self.location == ImageLocation::Local
    }

    /// The target the mark will be rewritten to point at, once known
    pub fn rewrite_target(&self) -> Option<&str> {
        self.uploaded_url.as_deref()
    }
}

/// Parse one line of text into an image reference.
///
/// Total over all inputs: a line that does not contain a recognized mark
/// yields `None`, never an error. Offsets in the result are byte offsets into
/// the trimmed line and satisfy `mark_start < mark_end <= line_text.len()`.
pub fn parse_line(
    source_file_name: &str,
    line_text: &str,
    line_number: usize,
) -> Option<ImageReference> {
    let line = line_text.trim();

    let prefix = line.find(MARK_PREFIX)?;
    let middle = line[prefix + MARK_PREFIX.len()..]
        .find(MARK_MIDDLE)
        .map(|i| i + prefix + MARK_PREFIX.len())?;
    let suffix = line[middle + MARK_MIDDLE.len()..]
        .find(MARK_SUFFIX)
        .map(|i| i + middle + MARK_MIDDLE.len())?;

    let title = line[prefix + MARK_PREFIX.len()..middle].to_string();
    let path = line[middle + MARK_MIDDLE.len()..suffix].to_string();

    let wrapped = line.starts_with(ANCHOR_OPENER) && line.ends_with(ANCHOR_CLOSER);
    let (mark_start, mark_end, kind) = if wrapped {
        // The rewrite must remove the anchor wrapper too.
        let kind = if line.contains(LARGE_PICTURE_TAG) {
            MarkKind::LargePicture
        } else if line.contains(COMMON_PICTURE_TAG) {
            MarkKind::CommonPicture
        } else {
            MarkKind::CustomHtml
        };
        (0, line.len(), kind)
    } else {
        (prefix, suffix + MARK_SUFFIX.len_utf8(), MarkKind::Plain)
    };

    let location = if NETWORK_SCHEMES.iter().any(|s| path.starts_with(s)) {
        ImageLocation::Network
    } else {
        ImageLocation::Local
    };
    let resolved_image_name = basename(&path).to_string();

    Some(ImageReference {
        source_file_name: source_file_name.to_string(),
        line_number,
        line_text: line.to_string(),
        original_mark: line[mark_start..mark_end].to_string(),
        mark_start,
        mark_end,
        title,
        extension: extension_of(&resolved_image_name).to_string(),
        path,
        resolved_image_name,
        location,
        kind,
        uploaded_url: None,
        rendered_mark: None,
    })
}

/// Substring after the last path separator.
fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Substring after the last `.`, without the dot; empty if none.
fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) => &name[i + 1..],
        None => "",
    }
}
