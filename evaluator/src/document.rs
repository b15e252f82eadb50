use notes::extract_code_blocks;

use crate::backend::Backend;
use crate::block::{CodeBlockEvaluation, EvalOptions};
use crate::dom::Element;
use crate::hash::ContentHash;

/// Inclusive line span of a rendered section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        LineRange { start, end }
    }

    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }
}

/// The evaluated code blocks of one version of one document.
///
/// A new version of a document always gets a new `DocumentEvaluation`; the
/// block list is fixed at construction.
#[derive(Debug)]
pub struct DocumentEvaluation {
    path: String,
    content_hash: ContentHash,
    blocks: Vec<CodeBlockEvaluation>,
}

impl DocumentEvaluation {
    /// Extract and evaluate every code block of `content`, in document order.
    pub fn new<B>(
        path: &str,
        content_hash: ContentHash,
        content: &str,
        lang: &str,
        backend: &B,
        options: &EvalOptions,
    ) -> Self
    where
        B: Backend + ?Sized,
    {
        let blocks = extract_code_blocks(lang, content)
            .into_iter()
            .map(|descriptor| CodeBlockEvaluation::new(descriptor, backend, options))
            .collect();
        DocumentEvaluation::from_blocks(path, content_hash, blocks)
    }

    pub fn from_blocks(path: &str, content_hash: ContentHash, blocks: Vec<CodeBlockEvaluation>) -> Self {
        DocumentEvaluation {
            path: path.to_string(),
            content_hash,
            blocks,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content_hash(&self) -> ContentHash {
        self.content_hash
    }

    pub fn blocks(&self) -> &[CodeBlockEvaluation] {
        &self.blocks
    }

    /// Attach the blocks displayed by a rendered section.
    ///
    /// A fenced block matches only a section spanning exactly its lines, and
    /// is the only block such a section holds. Inline blocks match when their
    /// line lies inside the section and are numbered in order from 0.
    /// Returns the number of blocks `section` displays afterwards; an inline
    /// block without a matching code element is not counted.
    pub fn attach(&self, section: &Element, lines: LineRange) -> usize {
        let mut attached = 0;
        let mut inline_index = 0;

        for block in &self.blocks {
            let descriptor = block.descriptor();
            if block.is_inline() {
                if lines.contains(descriptor.line_start) {
                    block.attach_at(section, inline_index);
                    inline_index += 1;
                    if block.is_attached_to(section) {
                        attached += 1;
                    }
                }
            } else if descriptor.line_start == lines.start && descriptor.line_end == lines.end {
                block.attach(section);
                if block.is_attached_to(section) {
                    attached += 1;
                }
                break;
            }
        }

        attached
    }

    /// Detach every block, cancelling their intervals.
    pub fn detach(&self) {
        for block in &self.blocks {
            block.detach();
        }
    }
}
