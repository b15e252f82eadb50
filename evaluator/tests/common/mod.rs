#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use evaluator::{
    Backend, BackendError, Callbacks, EvalOptions, ManualIntervals, MemoryVault, Scheduler,
    Settings, Vault,
};

/// A backend that understands one command per block:
///
/// - `fail:<message>` raises an error
/// - `text:<text>`, `html:<markup>`, `unsafe:<markup>` call the matching
///   render callback
/// - `tick:<ms>` registers an interval counting its fires in `ticks`
///
/// Anything else evaluates to its own source.
#[derive(Default)]
pub struct ScriptBackend {
    pub evaluated: RefCell<Vec<String>>,
    pub ticks: Rc<Cell<usize>>,
}

impl ScriptBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eval_count(&self) -> usize {
        self.evaluated.borrow().len()
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.evaluated.borrow().clone()
    }
}

impl Backend for ScriptBackend {
    type Value = String;

    fn eval(&self, source: &str, callbacks: &Callbacks) -> Result<String, BackendError> {
        self.evaluated.borrow_mut().push(source.to_string());

        let (command, arg) = source.split_once(':').unwrap_or((source, ""));
        let missing = |name: &str| BackendError::new(format!("{} unavailable", name), name);
        match command {
            "fail" => Err(BackendError::new(arg, format!("ScriptError: {}\n  at {}", arg, source))),
            "text" => {
                (callbacks.render_text.as_ref().ok_or_else(|| missing("text"))?)(arg.to_string());
                Ok("nil".to_string())
            }
            "html" => {
                (callbacks.render_html.as_ref().ok_or_else(|| missing("html"))?)(arg.to_string());
                Ok("nil".to_string())
            }
            "unsafe" => {
                (callbacks.render_unsafe_html.as_ref().ok_or_else(|| missing("unsafe"))?)(arg.to_string());
                Ok("nil".to_string())
            }
            "tick" => {
                let millis: u64 = arg.parse().map_err(|_| BackendError::new("bad period", arg))?;
                let ticks = self.ticks.clone();
                let register = callbacks.set_interval.as_ref().ok_or_else(|| missing("tick"))?;
                let id = register(Rc::new(move || ticks.set(ticks.get() + 1)), Duration::from_millis(millis))
                    .ok_or_else(|| missing("tick"))?;
                Ok(format!("interval {}", id.0))
            }
            _ => Ok(source.to_string()),
        }
    }

    fn pretty_print(&self, value: &String) -> String {
        value.clone()
    }
}

pub struct Harness {
    pub vault: Rc<MemoryVault>,
    pub backend: Rc<ScriptBackend>,
    pub intervals: Rc<ManualIntervals>,
    pub scheduler: Scheduler<ScriptBackend>,
}

pub fn harness() -> Harness {
    let vault = Rc::new(MemoryVault::new());
    let backend = Rc::new(ScriptBackend::new());
    let intervals = Rc::new(ManualIntervals::new());
    let dyn_vault: Rc<dyn Vault> = vault.clone();
    let scheduler = Scheduler::from_settings(
        dyn_vault,
        backend.clone(),
        &Settings::default(),
        intervals.clone(),
    );
    Harness {
        vault,
        backend,
        intervals,
        scheduler,
    }
}

pub fn options(intervals: &Rc<ManualIntervals>) -> EvalOptions {
    EvalOptions::new(&Settings::default(), intervals.clone())
}

/// A note holding one fenced `clojure` block per entry of `blocks`, with
/// the given `require` front matter.
pub fn note(requires: &[&str], blocks: &[&str]) -> String {
    let mut out = String::new();
    if !requires.is_empty() {
        out.push_str("---\nrequire:\n");
        for r in requires {
            out.push_str(&format!("  - \"[[{}]]\"\n", r));
        }
        out.push_str("---\n");
    }
    for block in blocks {
        out.push_str(&format!("\n```clojure\n{}\n```\n", block));
    }
    out
}
