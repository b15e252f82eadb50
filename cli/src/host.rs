use std::cell::RefCell;
use std::rc::Rc;

use evaluator::{
    DocumentEvaluation, Element, HostView, LineRange, Reconciler, RenderNotifier, Subscription,
    WeakElement, watch,
};
use notes::{Fragment, Section, SectionKind, split_sections};

/// How evaluated blocks find the elements that display them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachMode {
    /// Each section reports its source line range.
    #[default]
    Lines,
    /// Sections carry no line information; pair code elements with blocks
    /// in document order as sections are inserted.
    Reconcile,
}

struct RenderedSection {
    lines: LineRange,
    element: Element,
}

type Subscriber = (WeakElement, Subscription, Rc<dyn Fn()>);

/// A stand-in for an editor's preview: one element per top-level markdown
/// block, under a single root.
pub struct SimulatedHost {
    root: Element,
    sections: Vec<RenderedSection>,
    subscribers: RefCell<Vec<Subscriber>>,
}

impl SimulatedHost {
    pub fn render(content: &str) -> Rc<Self> {
        let root = Element::new("div");
        root.add_class("note");

        let sections = split_sections(content)
            .iter()
            .map(|section| {
                let element = section_element(section);
                root.append_child(element.clone());
                RenderedSection {
                    lines: LineRange::new(section.line_start, section.line_end),
                    element,
                }
            })
            .collect();

        Rc::new(SimulatedHost {
            root,
            sections,
            subscribers: RefCell::new(Vec::new()),
        })
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn line_ranges(&self) -> Vec<LineRange> {
        self.sections.iter().map(|s| s.lines).collect()
    }

    /// Attach `evaluation` to the rendered sections. Returns the number of
    /// blocks attached.
    pub fn attach(self: &Rc<Self>, evaluation: &Rc<DocumentEvaluation>, mode: AttachMode, lang: &str) -> usize {
        match mode {
            AttachMode::Lines => self
                .sections
                .iter()
                .map(|s| evaluation.attach(&s.element, s.lines))
                .sum(),
            AttachMode::Reconcile => {
                let reconciler = Rc::new(RefCell::new(Reconciler::new(evaluation.clone())));
                let view: Rc<dyn HostView> = self.clone();
                watch(reconciler.clone(), view, &**self, lang, Subscription::Once);
                self.insert_all();
                reconciler.borrow().reconciled()
            }
        }
    }

    /// Announce every section as freshly inserted, in document order.
    pub fn insert_all(&self) {
        for section in &self.sections {
            self.inserted(&section.element);
        }
    }

    fn inserted(&self, section: &Element) {
        let due: Vec<Rc<dyn Fn()>> = self
            .subscribers
            .borrow()
            .iter()
            .filter(|(s, _, _)| s.is(section))
            .map(|(_, _, callback)| callback.clone())
            .collect();
        self.subscribers
            .borrow_mut()
            .retain(|(s, mode, _)| !(s.is(section) && *mode == Subscription::Once));
        for callback in due {
            callback();
        }
    }

    /// Plain-text view: one paragraph per section, results included.
    pub fn to_text(&self) -> String {
        self.sections
            .iter()
            .map(|s| {
                s.element
                    .children()
                    .iter()
                    .map(|child| child.text_content().trim_end().to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn to_html(&self) -> String {
        self.root.to_html()
    }
}

impl HostView for SimulatedHost {
    fn sections(&self) -> Vec<Element> {
        self.sections.iter().map(|s| s.element.clone()).collect()
    }
}

impl RenderNotifier for SimulatedHost {
    fn on_content_inserted(&self, section: &Element, mode: Subscription, callback: Box<dyn Fn()>) {
        self.subscribers
            .borrow_mut()
            .push((section.downgrade(), mode, Rc::from(callback)));
    }
}

fn section_element(section: &Section) -> Element {
    let el = Element::new("div");
    el.add_class("section");
    match &section.kind {
        SectionKind::Code { language, content } => {
            let pre = Element::new("pre");
            let code = Element::with_text("code", content);
            if let Some(language) = language {
                code.add_class(&format!("language-{}", language));
            }
            pre.append_child(code);
            el.append_child(pre);
        }
        SectionKind::Text { fragments } => {
            let p = Element::new("p");
            for fragment in fragments {
                match fragment {
                    Fragment::Text(text) => p.append_child(Element::with_text("span", text)),
                    Fragment::Code(code) => p.append_child(Element::with_text("code", code)),
                }
            }
            el.append_child(p);
        }
    }
    el
}
