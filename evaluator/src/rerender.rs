use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};

/// Documents whose views must be rendered again, in request order.
///
/// A path is held at most once until the queue is drained.
#[derive(Debug, Default)]
pub struct RerenderQueue {
    order: RefCell<VecDeque<String>>,
    queued: RefCell<BTreeSet<String>>,
}

impl RerenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `path`. Returns false if it was already waiting.
    pub fn request(&self, path: &str) -> bool {
        if !self.queued.borrow_mut().insert(path.to_string()) {
            return false;
        }
        log::debug!("queued rerender of {}", path);
        self.order.borrow_mut().push_back(path.to_string());
        true
    }

    pub fn is_empty(&self) -> bool {
        self.order.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.borrow().len()
    }

    /// Take every queued path, oldest first.
    pub fn drain(&self) -> Vec<String> {
        self.queued.borrow_mut().clear();
        self.order.borrow_mut().drain(..).collect()
    }
}
