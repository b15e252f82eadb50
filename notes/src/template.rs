/// A fenced block ready to be inserted into a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenceTemplate {
    pub text: String,
    /// Line, relative to the insertion point, where the cursor belongs.
    pub cursor_line: usize,
}

/// Wrap `selection` in a fenced block of `lang`.
///
/// With nothing selected the block is empty and the cursor goes on the blank
/// line inside it.
pub fn wrap_in_fence(lang: &str, selection: Option<&str>) -> FenceTemplate {
    let body = selection.unwrap_or("");
    let text = format!("```{}\n{}\n```\n", lang, body);
    let cursor_line = if body.is_empty() { 1 } else { body.lines().count() + 2 };
    FenceTemplate { text, cursor_line }
}
