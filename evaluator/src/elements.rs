use notes::INLINE_MARKER;

use crate::dom::Element;

/// Attribute stamped on rendered inline code holding the block's source, so
/// the element can be recognised after its text was replaced by output.
pub const SOURCE_ATTRIBUTE: &str = "data-eval-source";

/// Class of the wrapper holding a fenced block's results.
pub const RESULTS_CLASS: &str = "eval-results";

/// Inline code that is, or once was, an evaluated expression.
pub fn is_inline_code(el: &Element) -> bool {
    el.tag() == "code"
        && (el.attribute(SOURCE_ATTRIBUTE).is_some()
            || el.text_content().starts_with(INLINE_MARKER))
}

/// A fenced code element of the evaluated language.
pub fn is_fenced_code(lang: &str, el: &Element) -> bool {
    el.tag() == "code" && el.has_class(&format!("language-{}", lang))
}

pub fn is_code_element(lang: &str, el: &Element) -> bool {
    is_inline_code(el) || is_fenced_code(lang, el)
}

/// Every evaluable code element under `container`, in document order.
pub fn code_elements(lang: &str, container: &Element) -> Vec<Element> {
    container
        .query_all("code")
        .into_iter()
        .filter(|el| is_code_element(lang, el))
        .collect()
}

pub fn has_code(lang: &str, container: &Element) -> bool {
    container
        .query_all("code")
        .iter()
        .any(|el| is_code_element(lang, el))
}

/// Inline evaluable code elements under `section`, in document order.
pub fn inline_code_elements(section: &Element) -> Vec<Element> {
    section
        .query_all("code")
        .into_iter()
        .filter(is_inline_code)
        .collect()
}
