//! Incremental evaluation of the code blocks embedded in markdown notes.
//!
//! Documents are evaluated together with the documents they `require`,
//! cached by content hash, and their results attached to the host's
//! rendered sections as those sections appear.

pub mod backend;
pub mod block;
pub mod document;
pub mod dom;
pub mod elements;
pub mod error;
pub mod hash;
pub mod intervals;
pub mod reconciler;
pub mod rerender;
pub mod resolver;
pub mod sanitize;
pub mod scheduler;
pub mod settings;
pub mod vault;

pub use backend::{Backend, BackendError, Callbacks, RenderFn};
pub use block::{CodeBlockEvaluation, EvalOptions};
pub use document::{DocumentEvaluation, LineRange};
pub use dom::{Element, WeakElement};
pub use error::{EvalError, ReconcileError, ResolveError};
pub use hash::{ContentHash, ContentHasher, sip_hash};
pub use intervals::{IntervalHandler, IntervalId, IntervalRegistry, IntervalScheduler, ManualIntervals};
pub use reconciler::{CodeSlot, HostView, Reconciler, RenderNotifier, Subscription, collect_slots, watch};
pub use rerender::RerenderQueue;
pub use resolver::{DependencyResolver, ExecutionPlan, topological_order};
pub use scheduler::{Evaluated, PendingEvaluation, Scheduler};
pub use settings::Settings;
pub use vault::{FileHandle, FsVault, MemoryVault, Vault, VaultError};
