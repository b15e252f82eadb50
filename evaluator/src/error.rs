use notes::ParseError;
use thiserror::Error;

use crate::vault::VaultError;

/// Failure to build an execution plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("cannot resolve `{link}` required by {from}")]
    UnresolvedLink { link: String, from: String },
    #[error("dependency cycle between: {}", nodes.join(", "))]
    Cycle { nodes: Vec<String> },
    #[error("{path}: {error}")]
    FrontMatter { path: String, error: ParseError },
    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Failure to evaluate a document. Errors raised by code blocks are not
/// failures: they become the output of their block.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    /// The scheduler was dropped while the evaluation was pending.
    #[error("evaluation of {0} was abandoned")]
    Abandoned(String),
}

/// The rendered code elements and the evaluated blocks disagree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("code element #{index} is {found}, expected {expected}")]
    Mismatch {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("code element #{index} has no matching block")]
    Exhausted { index: usize },
}
