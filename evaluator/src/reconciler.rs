use std::cell::RefCell;
use std::rc::Rc;

use notes::extract::inline_source;

use crate::document::DocumentEvaluation;
use crate::dom::Element;
use crate::elements::{SOURCE_ATTRIBUTE, code_elements, has_code, is_fenced_code};
use crate::error::ReconcileError;

/// One rendered code element and the section holding it.
#[derive(Debug, Clone)]
pub struct CodeSlot {
    pub code: Element,
    pub section: Element,
    pub inline: bool,
}

impl CodeSlot {
    /// The source this slot displays, as it would have been extracted.
    pub fn source(&self) -> String {
        if !self.inline {
            return self.code.text_content().trim().to_string();
        }
        match self.code.attribute(SOURCE_ATTRIBUTE) {
            Some(source) => source,
            None => {
                let text = self.code.text_content();
                inline_source(&text).unwrap_or(text.trim()).to_string()
            }
        }
    }

    fn describe(&self) -> String {
        describe(self.inline, &self.source())
    }
}

fn describe(inline: bool, source: &str) -> String {
    if inline {
        format!("inline `{}`", source)
    } else {
        format!("fenced `{}`", source)
    }
}

/// Every evaluable code element of `sections`, in document order.
pub fn collect_slots(lang: &str, sections: &[Element]) -> Vec<CodeSlot> {
    sections
        .iter()
        .flat_map(|section| {
            code_elements(lang, section).into_iter().map(|code| CodeSlot {
                inline: !is_fenced_code(lang, &code),
                code,
                section: section.clone(),
            })
        })
        .collect()
}

/// Pairs rendered code elements with the blocks of one evaluation, as
/// sections of the document finish rendering.
///
/// Slots and blocks are consumed in lockstep and in document order; each is
/// attached at most once.
#[derive(Debug)]
pub struct Reconciler {
    evaluation: Rc<DocumentEvaluation>,
    next_block: usize,
    next_slot: usize,
}

impl Reconciler {
    pub fn new(evaluation: Rc<DocumentEvaluation>) -> Self {
        Reconciler {
            evaluation,
            next_block: 0,
            next_slot: 0,
        }
    }

    pub fn evaluation(&self) -> &Rc<DocumentEvaluation> {
        &self.evaluation
    }

    /// Number of blocks attached so far.
    pub fn reconciled(&self) -> usize {
        self.next_block
    }

    pub fn is_complete(&self) -> bool {
        self.next_block >= self.evaluation.blocks().len()
    }

    /// Attach every pending block up to and including the last slot of
    /// `section`. Returns the number of blocks attached.
    ///
    /// On a mismatch nothing past the offending slot is attached, and the
    /// next call resumes from that slot.
    pub fn reconcile_section(&mut self, section: &Element, slots: &[CodeSlot]) -> Result<usize, ReconcileError> {
        let Some(last) = slots.iter().rposition(|s| s.section.same_node(section)) else {
            return Ok(0);
        };

        let mut attached = 0;
        while self.next_slot <= last {
            let index = self.next_slot;
            let slot = &slots[index];
            let Some(block) = self.evaluation.blocks().get(self.next_block) else {
                log::warn!("{}: more code elements than blocks", self.evaluation.path());
                return Err(ReconcileError::Exhausted { index });
            };

            let found = slot.source();
            if block.is_inline() != slot.inline || block.source() != found {
                return Err(ReconcileError::Mismatch {
                    index,
                    expected: describe(block.is_inline(), block.source()),
                    found: slot.describe(),
                });
            }

            if slot.inline {
                let section_index = slots[..index]
                    .iter()
                    .filter(|s| s.inline && s.section.same_node(&slot.section))
                    .count();
                block.attach_at(&slot.section, section_index);
            } else {
                block.attach(&slot.section);
            }

            self.next_slot += 1;
            self.next_block += 1;
            attached += 1;
        }

        Ok(attached)
    }
}

/// The host's rendered view of one document.
pub trait HostView {
    /// Rendered sections in document order. Sections not yet rendered may be
    /// missing.
    fn sections(&self) -> Vec<Element>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    /// Fire for the next insertion only.
    Once,
    /// Fire on every insertion.
    Repeating,
}

/// Tells interested parties when the host has inserted content into a
/// section.
pub trait RenderNotifier {
    fn on_content_inserted(&self, section: &Element, mode: Subscription, callback: Box<dyn Fn()>);
}

/// Reconcile each section of `view` holding evaluable code whenever the host
/// inserts content into it. Mismatches are logged and leave the section
/// untouched.
pub fn watch(
    reconciler: Rc<RefCell<Reconciler>>,
    view: Rc<dyn HostView>,
    notifier: &dyn RenderNotifier,
    lang: &str,
    mode: Subscription,
) {
    for section in view.sections() {
        if !has_code(lang, &section) {
            continue;
        }
        let weak_section = section.downgrade();
        let reconciler = reconciler.clone();
        let view = view.clone();
        let lang = lang.to_string();
        notifier.on_content_inserted(
            &section,
            mode,
            Box::new(move || {
                let Some(section) = weak_section.upgrade() else {
                    return;
                };
                let slots = collect_slots(&lang, &view.sections());
                let mut reconciler = reconciler.borrow_mut();
                if let Err(err) = reconciler.reconcile_section(&section, &slots) {
                    log::warn!("{}: {}", reconciler.evaluation().path(), err);
                }
            }),
        );
    }
}
