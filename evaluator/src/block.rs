use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use notes::CodeBlockDescriptor;

use crate::backend::{Backend, Callbacks, RenderFn};
use crate::dom::{Element, WeakElement};
use crate::elements::{RESULTS_CLASS, SOURCE_ATTRIBUTE, inline_code_elements};
use crate::intervals::{IntervalHandler, IntervalId, IntervalRegistry, IntervalScheduler};
use crate::sanitize::{self, Sanitizer};
use crate::settings::Settings;

/// How blocks are evaluated and what evaluated code may do.
#[derive(Clone)]
pub struct EvalOptions {
    pub full_errors: bool,
    pub allow_unsafe_html: bool,
    pub sanitizer: Sanitizer,
    pub intervals: Rc<dyn IntervalScheduler>,
}

impl EvalOptions {
    pub fn new(settings: &Settings, intervals: Rc<dyn IntervalScheduler>) -> Self {
        EvalOptions {
            full_errors: settings.full_errors,
            allow_unsafe_html: settings.allow_unsafe_html,
            sanitizer: Rc::new(sanitize::text_only),
            intervals,
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }
}

/// The result of evaluating one code block, and its binding to the element
/// currently displaying it.
pub struct CodeBlockEvaluation {
    state: Rc<BlockState>,
}

struct BlockState {
    descriptor: CodeBlockDescriptor,
    /// Set once, right after the backend returns.
    outcome: OnceCell<Outcome>,
    render_fn: RefCell<Option<RenderFn>>,
    attached: RefCell<Option<WeakElement>>,
    /// Position among the inline blocks of the attached section.
    section_index: Cell<usize>,
    /// Created on the first interval registration.
    intervals: RefCell<Option<IntervalRegistry>>,
    interval_host: Rc<dyn IntervalScheduler>,
}

struct Outcome {
    output: String,
    is_error: bool,
}

impl CodeBlockEvaluation {
    /// Evaluate `descriptor` right away.
    ///
    /// Errors raised by the backend are captured as the block's output; they
    /// never escape this constructor.
    pub fn new<B>(descriptor: CodeBlockDescriptor, backend: &B, options: &EvalOptions) -> Self
    where
        B: Backend + ?Sized,
    {
        let state = Rc::new(BlockState {
            descriptor,
            outcome: OnceCell::new(),
            render_fn: RefCell::new(None),
            attached: RefCell::new(None),
            section_index: Cell::new(0),
            intervals: RefCell::new(None),
            interval_host: options.intervals.clone(),
        });

        let callbacks = callbacks_for(&state, options);
        let outcome = match backend.eval(&state.descriptor.source, &callbacks) {
            Ok(value) => Outcome {
                output: backend.pretty_print(&value),
                is_error: false,
            },
            Err(err) => {
                log::warn!(
                    "error in code block at line {}: {}",
                    state.descriptor.line_start + 1,
                    err.detail
                );
                Outcome {
                    output: if options.full_errors { err.detail } else { err.message },
                    is_error: true,
                }
            }
        };
        let _ = state.outcome.set(outcome);

        CodeBlockEvaluation { state }
    }

    pub fn descriptor(&self) -> &CodeBlockDescriptor {
        &self.state.descriptor
    }

    pub fn source(&self) -> &str {
        &self.state.descriptor.source
    }

    pub fn is_inline(&self) -> bool {
        self.state.descriptor.is_inline()
    }

    pub fn output(&self) -> &str {
        self.state.outcome.get().map_or("", |o| o.output.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.state.outcome.get().is_some_and(|o| o.is_error)
    }

    pub fn has_render_function(&self) -> bool {
        self.state.render_fn.borrow().is_some()
    }

    /// Replace the plain output display with `render`, redrawing if attached.
    pub fn set_render_function(&self, render: RenderFn) {
        self.state.set_render_function(render);
    }

    pub fn attached_element(&self) -> Option<Element> {
        self.state.attached_element()
    }

    pub fn is_attached(&self) -> bool {
        self.attached_element().is_some()
    }

    pub fn section_index(&self) -> usize {
        self.state.section_index.get()
    }

    /// Number of intervals registered and not yet cancelled.
    pub fn active_intervals(&self) -> usize {
        self.state
            .intervals
            .borrow()
            .as_ref()
            .map_or(0, |r| r.active().len())
    }

    /// Attach to `el` and render into it. See [`CodeBlockEvaluation::attach_at`].
    pub fn attach(&self, el: &Element) -> bool {
        self.attach_at(el, 0)
    }

    /// Attach to `el`, the `section_index`-th inline block of that section
    /// for inline blocks, and render.
    ///
    /// Attaching again to the element already displaying this block does
    /// nothing. Returns whether anything was rendered; an inline block whose
    /// code element is missing from `el` stays detached.
    pub fn attach_at(&self, el: &Element, section_index: usize) -> bool {
        let unchanged = self
            .state
            .attached
            .borrow()
            .as_ref()
            .is_some_and(|w| w.is(el))
            && self.state.section_index.get() == section_index;
        if unchanged {
            return false;
        }

        *self.state.attached.borrow_mut() = Some(el.downgrade());
        self.state.section_index.set(section_index);
        if !self.state.render() {
            self.state.attached.borrow_mut().take();
            return false;
        }
        true
    }

    /// Whether this block is currently displayed by `el`.
    pub fn is_attached_to(&self, el: &Element) -> bool {
        self.attached_element().is_some_and(|attached| attached.same_node(el))
    }

    /// Forget the attached element and cancel every interval this block
    /// registered.
    pub fn detach(&self) {
        self.state.attached.borrow_mut().take();
        if let Some(registry) = self.state.intervals.borrow_mut().as_mut() {
            registry.cancel_all();
        }
    }
}

impl fmt::Debug for CodeBlockEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeBlockEvaluation")
            .field("descriptor", &self.state.descriptor)
            .field("output", &self.output())
            .field("is_error", &self.is_error())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl BlockState {
    fn attached_element(&self) -> Option<Element> {
        self.attached.borrow().as_ref().and_then(WeakElement::upgrade)
    }

    fn output(&self) -> &str {
        self.outcome.get().map_or("", |o| o.output.as_str())
    }

    fn is_error(&self) -> bool {
        self.outcome.get().is_some_and(|o| o.is_error)
    }

    fn set_render_function(&self, render: RenderFn) {
        *self.render_fn.borrow_mut() = Some(render);
        self.render();
    }

    fn register_interval(&self, handler: IntervalHandler, period: Duration) -> IntervalId {
        self.intervals
            .borrow_mut()
            .get_or_insert_with(|| IntervalRegistry::new(self.interval_host.clone()))
            .register(handler, period)
    }

    /// Redraw into the attached element. Returns false when there is no
    /// element to draw into.
    fn render(&self) -> bool {
        let Some(el) = self.attached_element() else {
            return false;
        };
        // Output is not known until the backend returns; callbacks fired
        // during evaluation only store their render function.
        if self.outcome.get().is_none() {
            return true;
        }
        if self.descriptor.is_inline() {
            self.render_inline(&el)
        } else {
            self.render_block(&el);
            true
        }
    }

    fn render_block(&self, container: &Element) {
        if let Some(previous) = container.child_with_class(RESULTS_CLASS) {
            container.remove_child(&previous);
        }

        let render_fn = self.render_fn.borrow().clone();
        let (wrapper, results) = if render_fn.is_some() {
            (Element::new("div"), Element::new("div"))
        } else {
            (Element::new("pre"), Element::new("code"))
        };
        wrapper.add_class(RESULTS_CLASS);

        if self.is_error() {
            for el in [&wrapper, &results] {
                el.set_style("background-color", "red");
                el.set_style("color", "white");
            }
            results.set_text(&format!("ERROR: {}", self.output()));
        } else if let Some(render) = render_fn {
            render(&results);
        } else {
            results.set_text(&format!("=> {}", self.output()));
        }

        wrapper.append_child(results);
        container.append_child(wrapper);
    }

    fn render_inline(&self, section: &Element) -> bool {
        let index = self.section_index.get();
        let Some(code) = inline_code_elements(section).into_iter().nth(index) else {
            log::warn!(
                "no inline code element #{} in section for `{}`",
                index,
                self.descriptor.source
            );
            return false;
        };

        code.set_attribute(SOURCE_ATTRIBUTE, &self.descriptor.source);
        let render_fn = self.render_fn.borrow().clone();
        match render_fn {
            Some(render) if !self.is_error() => {
                code.set_text("");
                render(&code);
            }
            _ => code.set_text(self.output()),
        }

        code.set_style("color", if self.is_error() { "red" } else { "inherit" });
        code.set_style("background-color", "inherit");
        code.set_style("font-size", "inherit");
        true
    }
}

/// Build the callbacks handed to the backend for one block. They hold the
/// block weakly: once the block is dropped they do nothing.
fn callbacks_for(state: &Rc<BlockState>, options: &EvalOptions) -> Callbacks {
    let render_with = |make: fn(String, &EvalOptions) -> RenderFn| {
        let weak: Weak<BlockState> = Rc::downgrade(state);
        let options = options.clone();
        let callback: Rc<dyn Fn(String)> = Rc::new(move |payload: String| {
            if let Some(state) = weak.upgrade() {
                state.set_render_function(make(payload, &options));
            }
        });
        Some(callback)
    };

    let component_weak = Rc::downgrade(state);
    let interval_weak = Rc::downgrade(state);

    Callbacks {
        render_text: render_with(|text, _| Rc::new(move |el: &Element| el.set_text(&text))),
        render_html: render_with(|html, options| {
            let sanitizer = options.sanitizer.clone();
            Rc::new(move |el: &Element| el.append_child(sanitizer(&html)))
        }),
        render_unsafe_html: if options.allow_unsafe_html {
            render_with(|html, _| Rc::new(move |el: &Element| el.set_inner_html(&html)))
        } else {
            None
        },
        render_code: render_with(|code, _| {
            Rc::new(move |el: &Element| el.set_text(&format!("=> {}", code)))
        }),
        render_component: Some(Rc::new(move |mount: RenderFn| {
            if let Some(state) = component_weak.upgrade() {
                state.set_render_function(mount);
            }
        })),
        set_interval: Some(Rc::new(move |handler: IntervalHandler, period: Duration| {
            interval_weak
                .upgrade()
                .map(|state| state.register_interval(handler, period))
        })),
    }
}
