use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::backend::Backend;
use crate::block::EvalOptions;
use crate::document::DocumentEvaluation;
use crate::error::{EvalError, ResolveError};
use crate::hash::{ContentHasher, sip_hash};
use crate::intervals::IntervalScheduler;
use crate::resolver::{DependencyResolver, ExecutionPlan};
use crate::settings::Settings;
use crate::vault::Vault;

/// The outcome of a successful [`Scheduler::evaluate`].
#[derive(Debug, Clone)]
pub struct Evaluated {
    pub evaluation: Rc<DocumentEvaluation>,
    /// The content was unchanged and the cached evaluation was served.
    pub from_cache: bool,
}

/// A pending evaluation. Every caller asking for the same `(path, force)`
/// while it runs shares it.
pub type PendingEvaluation = Shared<LocalBoxFuture<'static, Result<Evaluated, EvalError>>>;

type Listener = Rc<dyn Fn(&Rc<DocumentEvaluation>)>;

/// Evaluates documents together with their dependencies, caching each
/// document's latest evaluation by content hash.
pub struct Scheduler<B: Backend + 'static> {
    inner: Rc<Inner<B>>,
}

struct Inner<B> {
    vault: Rc<dyn Vault>,
    backend: Rc<B>,
    options: EvalOptions,
    lang: String,
    hasher: Cell<ContentHasher>,
    cache: RefCell<HashMap<String, Rc<DocumentEvaluation>>>,
    in_flight: RefCell<HashMap<(String, bool), PendingEvaluation>>,
    /// Transitive dependencies each cached document was last evaluated with.
    dependencies: RefCell<BTreeMap<String, Vec<String>>>,
    listeners: RefCell<Vec<Listener>>,
    /// Bumped by `clear`; evaluations started under an older epoch must not
    /// touch the cache.
    epoch: Cell<u64>,
}

impl<B: Backend + 'static> Clone for Scheduler<B> {
    fn clone(&self) -> Self {
        Scheduler {
            inner: self.inner.clone(),
        }
    }
}

impl<B: Backend + 'static> Scheduler<B> {
    pub fn new(vault: Rc<dyn Vault>, backend: Rc<B>, options: EvalOptions, lang: &str) -> Self {
        Scheduler {
            inner: Rc::new(Inner {
                vault,
                backend,
                options,
                lang: lang.to_string(),
                hasher: Cell::new(sip_hash),
                cache: RefCell::new(HashMap::new()),
                in_flight: RefCell::new(HashMap::new()),
                dependencies: RefCell::new(BTreeMap::new()),
                listeners: RefCell::new(Vec::new()),
                epoch: Cell::new(0),
            }),
        }
    }

    pub fn from_settings(
        vault: Rc<dyn Vault>,
        backend: Rc<B>,
        settings: &Settings,
        intervals: Rc<dyn IntervalScheduler>,
    ) -> Self {
        let options = EvalOptions::new(settings, intervals);
        Scheduler::new(vault, backend, options, &settings.block_language)
    }

    /// Use `hasher` instead of SipHash to identify document versions.
    pub fn with_hasher(self, hasher: ContentHasher) -> Self {
        self.inner.hasher.set(hasher);
        self
    }

    pub fn backend(&self) -> &Rc<B> {
        &self.inner.backend
    }

    /// Call `listener` with every freshly built evaluation, dependencies
    /// included. Cache hits are not reported.
    pub fn on_document_evaluated(&self, listener: impl Fn(&Rc<DocumentEvaluation>) + 'static) {
        self.inner.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Evaluate `path` after its dependencies.
    ///
    /// The request is registered before this returns, so a second call with
    /// the same arguments made before the first completes gets the same
    /// pending result. Dependencies are never forced, even when `force` is
    /// set for the root.
    pub fn evaluate(&self, path: &str, force: bool) -> PendingEvaluation {
        let key = (path.to_string(), force);
        if let Some(pending) = self.inner.in_flight.borrow().get(&key) {
            log::debug!("joining in-flight evaluation of {} (force: {})", path, force);
            return pending.clone();
        }

        let pending = run(
            Rc::downgrade(&self.inner),
            self.inner.vault.clone(),
            path.to_string(),
            force,
            self.inner.epoch.get(),
        )
        .boxed_local()
        .shared();
        self.inner
            .in_flight
            .borrow_mut()
            .insert(key, pending.clone());
        pending
    }

    /// The latest evaluation of `path`, if any.
    pub fn cached(&self, path: &str) -> Option<Rc<DocumentEvaluation>> {
        self.inner.cache.borrow().get(path).cloned()
    }

    /// Documents whose latest evaluation depended on `path`, directly or not.
    pub fn dependents(&self, path: &str) -> Vec<String> {
        self.inner
            .dependencies
            .borrow()
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| d == path))
            .map(|(dependent, _)| dependent.clone())
            .collect()
    }

    pub fn is_in_flight(&self, path: &str) -> bool {
        self.inner
            .in_flight
            .borrow()
            .keys()
            .any(|(p, _)| p == path)
    }

    /// Drop every cached evaluation, detaching it first. Evaluations still
    /// running finish detached and are not cached.
    pub fn clear(&self) {
        self.inner.epoch.set(self.inner.epoch.get() + 1);
        self.inner.in_flight.borrow_mut().clear();
        self.inner.dependencies.borrow_mut().clear();
        let evicted: Vec<Rc<DocumentEvaluation>> = self
            .inner
            .cache
            .borrow_mut()
            .drain()
            .map(|(_, evaluation)| evaluation)
            .collect();
        log::debug!("cleared {} cached evaluations", evicted.len());
        for evaluation in evicted {
            evaluation.detach();
        }
    }
}

fn upgrade<B>(weak: &Weak<Inner<B>>, path: &str) -> Result<Rc<Inner<B>>, EvalError> {
    weak.upgrade()
        .ok_or_else(|| EvalError::Abandoned(path.to_string()))
}

async fn run<B: Backend + 'static>(
    weak: Weak<Inner<B>>,
    vault: Rc<dyn Vault>,
    path: String,
    force: bool,
    epoch: u64,
) -> Result<Evaluated, EvalError> {
    let result = evaluate_with_dependencies(&weak, vault.as_ref(), &path, force, epoch).await;

    if let Some(inner) = weak.upgrade() {
        if inner.epoch.get() == epoch {
            inner.in_flight.borrow_mut().remove(&(path, force));
        }
    }
    result
}

async fn evaluate_with_dependencies<B: Backend + 'static>(
    weak: &Weak<Inner<B>>,
    vault: &dyn Vault,
    path: &str,
    force: bool,
    epoch: u64,
) -> Result<Evaluated, EvalError> {
    let plan = DependencyResolver::new(vault).resolve(path).await?;

    for dependency in plan.dependencies() {
        let pending = Scheduler {
            inner: upgrade(weak, path)?,
        }
        .evaluate(dependency, false);
        pending.await?;
    }

    let file = vault
        .file_by_path(path)
        .ok_or_else(|| ResolveError::NotFound(path.to_string()))?;
    let content = vault.read(&file).await?;

    let inner = upgrade(weak, path)?;
    Ok(inner.evaluate_root(path, &content, &plan, force, epoch))
}

impl<B: Backend> Inner<B> {
    /// Serve `path` from the cache or evaluate it afresh.
    fn evaluate_root(
        &self,
        path: &str,
        content: &str,
        plan: &ExecutionPlan,
        force: bool,
        epoch: u64,
    ) -> Evaluated {
        let hash = (self.hasher.get())(content);
        let current = self.cache.borrow().get(path).cloned();

        if let Some(current) = &current {
            if !force && current.content_hash() == hash {
                log::debug!("cache hit for {} ({})", path, hash);
                return Evaluated {
                    evaluation: current.clone(),
                    from_cache: true,
                };
            }
            current.detach();
        }

        log::debug!(
            "evaluating {} ({}, forced: {}, previously cached: {})",
            path,
            hash,
            force,
            current.is_some()
        );
        let evaluation = Rc::new(DocumentEvaluation::new(
            path,
            hash,
            content,
            &self.lang,
            self.backend.as_ref(),
            &self.options,
        ));

        if self.epoch.get() != epoch {
            log::debug!("discarding evaluation of {} finished after clear", path);
            evaluation.detach();
            return Evaluated {
                evaluation,
                from_cache: false,
            };
        }

        self.cache
            .borrow_mut()
            .insert(path.to_string(), evaluation.clone());
        self.dependencies
            .borrow_mut()
            .insert(path.to_string(), plan.dependencies().to_vec());

        let listeners: Vec<Listener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener(&evaluation);
        }

        Evaluated {
            evaluation,
            from_cache: false,
        }
    }
}
