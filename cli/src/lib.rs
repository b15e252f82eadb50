//! Support code for the `quill` command: settings loading and a simulated
//! preview host that renders a note to text or HTML.

pub mod config;
pub mod host;

use std::path::Path;

use evaluator::{FsVault, Vault};

/// The vault path of `file`, given either as a filesystem path or as a path
/// relative to the vault root.
pub fn document_path(vault: &FsVault, file: &str) -> Option<String> {
    if let Some(path) = vault.relative_path(Path::new(file)) {
        return Some(path);
    }
    vault.file_by_path(file).map(|handle| handle.path)
}
