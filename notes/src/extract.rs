use std::sync::LazyLock;

use regex::Regex;

/// Marker that turns an inline code span into an evaluated expression.
pub const INLINE_MARKER: char = '|';

static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```").expect("valid opening fence pattern"));

static CLOSING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```(\s|$)").expect("valid closing fence pattern"));

static INLINE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`\|([^`]*)`").expect("valid inline span pattern"));

/// One code block found in a document, in source order.
///
/// Line numbers are 0-based. A fenced block spans from its opening fence line
/// to its closing fence line; an inline block starts and ends on its own line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlockDescriptor {
    pub source: String,
    pub line_start: usize,
    pub line_end: usize,
    pub kind: BlockKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Fenced,
    Inline,
}

impl CodeBlockDescriptor {
    pub fn is_inline(&self) -> bool {
        self.kind == BlockKind::Inline
    }

    /// Whether the block's line span lies within `start..=end`.
    pub fn within(&self, start: usize, end: usize) -> bool {
        self.line_start >= start && self.line_end <= end
    }
}

/// Extract every evaluable code block of language `lang` from `markdown`.
pub fn extract_code_blocks(lang: &str, markdown: &str) -> Vec<CodeBlockDescriptor> {
    let opening = Regex::new(&format!(r"^```{}(\s|$)", regex::escape(lang)))
        .expect("escaped language tag is a valid pattern");

    let mut blocks = Vec::new();
    // The fence we are inside, if any. Fences in other languages are
    // tracked too so their bodies are never scanned for inline blocks.
    let mut open: Option<OpenFence> = None;

    for (line_no, line) in markdown.lines().enumerate() {
        if let Some(fence) = open.as_mut() {
            if CLOSING_FENCE.is_match(line) {
                if fence.evaluated {
                    blocks.push(CodeBlockDescriptor {
                        source: fence.body.join("\n").trim().to_string(),
                        line_start: fence.start,
                        line_end: line_no,
                        kind: BlockKind::Fenced,
                    });
                }
                open = None;
            } else {
                fence.body.push(line);
            }
            continue;
        }

        if OPENING_FENCE.is_match(line) {
            open = Some(OpenFence {
                start: line_no,
                evaluated: opening.is_match(line),
                body: Vec::new(),
            });
            continue;
        }

        for caps in INLINE_SPAN.captures_iter(line) {
            blocks.push(CodeBlockDescriptor {
                source: caps[1].trim().to_string(),
                line_start: line_no,
                line_end: line_no,
                kind: BlockKind::Inline,
            });
        }
    }

    if let Some(fence) = open.filter(|f| f.evaluated) {
        log::debug!("dropping unterminated ```{} fence opened on line {}", lang, fence.start);
    }

    blocks
}

struct OpenFence<'a> {
    start: usize,
    /// Whether the fence's language is the one being evaluated.
    evaluated: bool,
    body: Vec<&'a str>,
}

/// Strip the inline marker from rendered inline code text, if present.
pub fn inline_source(text: &str) -> Option<&str> {
    text.strip_prefix(INLINE_MARKER).map(str::trim)
}
