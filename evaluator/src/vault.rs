use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use futures::future::{self, FutureExt, LocalBoxFuture};
use thiserror::Error;
use walkdir::WalkDir;

/// A document in the vault, identified by its vault-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle {
    pub path: String,
}

impl FileHandle {
    pub fn new(path: impl Into<String>) -> Self {
        FileHandle { path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("no such document: {0}")]
    NotFound(String),
    #[error("cannot read '{path}': {message}")]
    Io { path: String, message: String },
}

/// The host's collection of documents.
pub trait Vault {
    fn file_by_path(&self, path: &str) -> Option<FileHandle>;

    /// Resolve a link written in `source_path` to a document.
    fn resolve_link(&self, link: &str, source_path: &str) -> Option<FileHandle>;

    fn read<'a>(&'a self, file: &'a FileHandle) -> LocalBoxFuture<'a, Result<String, VaultError>>;
}

/// Resolve `link` against a sorted list of vault paths.
///
/// Tries the link as a path, then with `.md` appended, then as a file stem:
/// a document next to `source_path` wins, otherwise the first match.
fn resolve_in<'a>(paths: impl Iterator<Item = &'a String> + Clone, link: &str, source_path: &str) -> Option<String> {
    let link = link.trim().trim_start_matches("./");
    let with_ext = format!("{}.md", link);
    if let Some(found) = paths.clone().find(|p| **p == link || **p == with_ext) {
        return Some(found.clone());
    }

    let source_dir = Path::new(source_path).parent().unwrap_or(Path::new(""));
    let stem_matches: Vec<&String> = paths
        .filter(|p| {
            let path = Path::new(p.as_str());
            path.extension().is_some_and(|e| e == "md")
                && (path.file_stem().is_some_and(|s| s == link) || path.with_extension("") == Path::new(link))
        })
        .collect();
    stem_matches
        .iter()
        .find(|p| Path::new(p.as_str()).parent() == Some(source_dir))
        .or(stem_matches.first())
        .map(|p| (*p).clone())
}

// ---------------------------------------------------------------------------
// In-memory vault
// ---------------------------------------------------------------------------

/// A vault held in memory. Counts reads, which tests use to observe caching.
#[derive(Debug, Default)]
pub struct MemoryVault {
    files: RefCell<BTreeMap<String, String>>,
    reads: Cell<usize>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a document.
    pub fn insert(&self, path: &str, content: &str) {
        self.files
            .borrow_mut()
            .insert(path.to_string(), content.to_string());
    }

    pub fn remove(&self, path: &str) {
        self.files.borrow_mut().remove(path);
    }

    pub fn read_count(&self) -> usize {
        self.reads.get()
    }
}

impl Vault for MemoryVault {
    fn file_by_path(&self, path: &str) -> Option<FileHandle> {
        self.files
            .borrow()
            .contains_key(path)
            .then(|| FileHandle::new(path))
    }

    fn resolve_link(&self, link: &str, source_path: &str) -> Option<FileHandle> {
        let files = self.files.borrow();
        resolve_in(files.keys(), link, source_path).map(FileHandle::new)
    }

    fn read<'a>(&'a self, file: &'a FileHandle) -> LocalBoxFuture<'a, Result<String, VaultError>> {
        self.reads.set(self.reads.get() + 1);
        let result = self
            .files
            .borrow()
            .get(&file.path)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(file.path.clone()));
        future::ready(result).boxed_local()
    }
}

// ---------------------------------------------------------------------------
// Directory vault
// ---------------------------------------------------------------------------

/// A vault backed by a directory of markdown files.
#[derive(Debug)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsVault { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Vault-relative path of a file given relative to the working directory
    /// or absolute.
    pub fn relative_path(&self, file: &Path) -> Option<String> {
        let root = self.root.canonicalize().ok()?;
        let file = file.canonicalize().ok()?;
        let rel = file.strip_prefix(&root).ok()?;
        Some(to_vault_path(rel))
    }

    /// Every markdown document, as sorted vault-relative paths.
    fn index(&self) -> Vec<String> {
        let mut paths: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().is_some_and(|e| e == "md"))
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(to_vault_path)
            })
            .collect();
        paths.sort();
        paths
    }
}

fn to_vault_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

impl Vault for FsVault {
    fn file_by_path(&self, path: &str) -> Option<FileHandle> {
        self.root
            .join(path)
            .is_file()
            .then(|| FileHandle::new(path))
    }

    fn resolve_link(&self, link: &str, source_path: &str) -> Option<FileHandle> {
        let index = self.index();
        resolve_in(index.iter(), link, source_path).map(FileHandle::new)
    }

    fn read<'a>(&'a self, file: &'a FileHandle) -> LocalBoxFuture<'a, Result<String, VaultError>> {
        let result = std::fs::read_to_string(self.root.join(&file.path)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VaultError::NotFound(file.path.clone())
            } else {
                VaultError::Io {
                    path: file.path.clone(),
                    message: e.to_string(),
                }
            }
        });
        future::ready(result).boxed_local()
    }
}
