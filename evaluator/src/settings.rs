use serde::Deserialize;

/// User-facing evaluation settings.
///
/// Changing any of these invalidates every cached evaluation; callers must
/// `clear()` the scheduler after applying new settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Language tag of the fenced blocks to evaluate.
    pub block_language: String,
    /// Show the full formatted error instead of just its message.
    pub full_errors: bool,
    /// Offer the unsanitized HTML render callback to evaluated code.
    pub allow_unsafe_html: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            block_language: "clojure".to_string(),
            full_errors: false,
            allow_unsafe_html: true,
        }
    }
}
