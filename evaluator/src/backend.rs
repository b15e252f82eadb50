use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::dom::Element;
use crate::intervals::{IntervalHandler, IntervalId};

/// Draws a block's special output into the element it is attached to.
pub type RenderFn = Rc<dyn Fn(&Element)>;

/// The embedded interpreter.
///
/// A backend owns its evaluation context: whatever `init(host, bindings)`
/// produces in a concrete interpreter is set up by the backend's constructor.
/// Evaluation is synchronous, but the callbacks it receives may be kept and
/// invoked after `eval` returns.
pub trait Backend {
    type Value;

    fn eval(&self, source: &str, callbacks: &Callbacks) -> Result<Self::Value, BackendError>;

    /// Display form of a returned value.
    fn pretty_print(&self, value: &Self::Value) -> String;
}

/// The capabilities offered to evaluated code. Every slot is optional; a
/// backend asked for a missing capability should raise an error.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub render_text: Option<Rc<dyn Fn(String)>>,
    /// HTML passed through the host's sanitizer.
    pub render_html: Option<Rc<dyn Fn(String)>>,
    pub render_unsafe_html: Option<Rc<dyn Fn(String)>>,
    /// An already pretty-printed value, shown as code.
    pub render_code: Option<Rc<dyn Fn(String)>>,
    /// A component that mounts itself into the output element.
    pub render_component: Option<Rc<dyn Fn(RenderFn)>>,
    /// Registers a repeating handler owned by the evaluating block. Returns
    /// `None` once that block is gone.
    pub set_interval: Option<Rc<dyn Fn(IntervalHandler, Duration) -> Option<IntervalId>>>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("render_text", &self.render_text.is_some())
            .field("render_html", &self.render_html.is_some())
            .field("render_unsafe_html", &self.render_unsafe_html.is_some())
            .field("render_code", &self.render_code.is_some())
            .field("render_component", &self.render_component.is_some())
            .field("set_interval", &self.set_interval.is_some())
            .finish()
    }
}

/// An error raised by evaluated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// Short, one-line description.
    pub message: String,
    /// Full formatted error, shown when full errors are enabled.
    pub detail: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>, detail: impl Into<String>) -> Self {
        BackendError {
            message: message.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BackendError {}
