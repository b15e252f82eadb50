use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

/// Identifier of a repeating timer handed out by an [`IntervalScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntervalId(pub u64);

/// Work run every time an interval elapses.
pub type IntervalHandler = Rc<dyn Fn()>;

/// The host's repeating-timer primitive.
pub trait IntervalScheduler {
    fn set_interval(&self, handler: IntervalHandler, period: Duration) -> IntervalId;
    fn clear_interval(&self, id: IntervalId);
}

/// The intervals registered by one code block.
///
/// Every interval registered here is cleared exactly once, by
/// [`IntervalRegistry::cancel_all`].
pub struct IntervalRegistry {
    host: Rc<dyn IntervalScheduler>,
    active: Vec<IntervalId>,
}

impl IntervalRegistry {
    pub fn new(host: Rc<dyn IntervalScheduler>) -> Self {
        IntervalRegistry {
            host,
            active: Vec::new(),
        }
    }

    pub fn register(&mut self, handler: IntervalHandler, period: Duration) -> IntervalId {
        let id = self.host.set_interval(handler, period);
        self.active.push(id);
        id
    }

    pub fn active(&self) -> &[IntervalId] {
        &self.active
    }

    pub fn cancel_all(&mut self) {
        for id in self.active.drain(..) {
            self.host.clear_interval(id);
        }
    }
}

struct Timer {
    handler: IntervalHandler,
    period: Duration,
    elapsed: Duration,
}

/// A deterministic interval scheduler driven by [`ManualIntervals::advance`].
#[derive(Default)]
pub struct ManualIntervals {
    timers: RefCell<BTreeMap<IntervalId, Timer>>,
    next_id: Cell<u64>,
    cleared: Cell<usize>,
}

impl ManualIntervals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward, firing each due handler once per elapsed period.
    /// Returns the number of handler invocations.
    pub fn advance(&self, by: Duration) -> usize {
        let mut due: Vec<(IntervalId, IntervalHandler, u32)> = Vec::new();
        for (id, timer) in self.timers.borrow_mut().iter_mut() {
            if timer.period.is_zero() {
                continue;
            }
            timer.elapsed += by;
            let mut fires = 0;
            while timer.elapsed >= timer.period {
                timer.elapsed -= timer.period;
                fires += 1;
            }
            if fires > 0 {
                due.push((*id, timer.handler.clone(), fires));
            }
        }

        // Handlers may register or clear intervals, so none of the timer
        // table may stay borrowed while they run.
        let mut fired = 0;
        for (id, handler, fires) in due {
            for _ in 0..fires {
                if !self.timers.borrow().contains_key(&id) {
                    break;
                }
                handler();
                fired += 1;
            }
        }
        fired
    }

    /// Number of intervals currently scheduled.
    pub fn active_count(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Number of `clear_interval` calls that removed a live interval.
    pub fn cleared_count(&self) -> usize {
        self.cleared.get()
    }
}

impl IntervalScheduler for ManualIntervals {
    fn set_interval(&self, handler: IntervalHandler, period: Duration) -> IntervalId {
        let id = IntervalId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.timers.borrow_mut().insert(
            id,
            Timer {
                handler,
                period,
                elapsed: Duration::ZERO,
            },
        );
        log::debug!("scheduled interval {:?} every {:?}", id, period);
        id
    }

    fn clear_interval(&self, id: IntervalId) {
        if self.timers.borrow_mut().remove(&id).is_some() {
            self.cleared.set(self.cleared.get() + 1);
            log::debug!("cleared interval {:?}", id);
        } else {
            log::warn!("clear_interval called for unknown interval {:?}", id);
        }
    }
}
