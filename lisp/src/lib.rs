//! A small Clojure-flavoured interpreter, usable as the evaluation backend
//! of notes written with `clojure` code blocks.

pub mod builtins;
pub mod env;
pub mod error;
pub mod eval;
pub mod hiccup;
pub mod reader;
pub mod value;

use evaluator::{Backend, BackendError, Callbacks};

pub use env::Env;
pub use error::LispError;
pub use eval::Context;
pub use value::Value;

/// The interpreter behind code blocks. Every block evaluates in the same
/// global environment, so a block sees everything defined by the blocks and
/// documents evaluated before it.
pub struct LispBackend {
    globals: Env,
}

impl LispBackend {
    pub fn new() -> Self {
        LispBackend::init(std::iter::empty())
    }

    /// Create the interpreter with host `bindings` predefined.
    pub fn init(bindings: impl IntoIterator<Item = (String, Value)>) -> Self {
        let globals = Env::new();
        builtins::install(&globals);
        for (name, value) in bindings {
            globals.set(&name, value);
        }
        LispBackend { globals }
    }

    pub fn globals(&self) -> &Env {
        &self.globals
    }

    /// Read and evaluate `source` without any host capabilities.
    pub fn eval_str(&self, source: &str) -> Result<Value, LispError> {
        self.eval_with(source, &Context::default())
    }

    fn eval_with(&self, source: &str, ctx: &Context) -> Result<Value, LispError> {
        let forms = reader::read_all(source)?;
        eval::eval_body(&forms, &self.globals, ctx)
    }
}

impl Default for LispBackend {
    fn default() -> Self {
        LispBackend::new()
    }
}

impl Backend for LispBackend {
    type Value = Value;

    fn eval(&self, source: &str, callbacks: &Callbacks) -> Result<Value, BackendError> {
        let ctx = Context::new(callbacks.clone());
        self.eval_with(source, &ctx).map_err(|err| {
            log::debug!("evaluation failed: {}", err);
            BackendError::new(
                err.to_string(),
                format!("{}: {}\n  while evaluating: {}", err.kind(), err, source.trim()),
            )
        })
    }

    fn pretty_print(&self, value: &Value) -> String {
        value.pr_str()
    }
}
