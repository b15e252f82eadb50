use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::rc::{Rc, Weak};

/// A node in the host's rendered tree.
///
/// Cloning an `Element` clones the handle, not the node. Identity is by
/// pointer: two handles are the same element iff [`Element::same_node`].
#[derive(Clone)]
pub struct Element(Rc<RefCell<Node>>);

/// A non-owning handle to an [`Element`].
#[derive(Clone, Default)]
pub struct WeakElement(Weak<RefCell<Node>>);

#[derive(Debug, Default)]
struct Node {
    tag: String,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: String,
    /// Raw markup set through `set_inner_html`; replaces text and children.
    html: Option<String>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Element(Rc::new(RefCell::new(Node {
            tag: tag.to_string(),
            ..Node::default()
        })))
    }

    /// Create an element holding only text.
    pub fn with_text(tag: &str, text: &str) -> Self {
        let el = Element::new(tag);
        el.set_text(text);
        el
    }

    pub fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    pub fn same_node(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement(Rc::downgrade(&self.0))
    }

    // --- classes, attributes, styles ---

    pub fn add_class(&self, class: &str) {
        let mut node = self.0.borrow_mut();
        if !node.classes.iter().any(|c| c == class) {
            node.classes.push(class.to_string());
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.0.borrow().classes.iter().any(|c| c == class)
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.borrow().attributes.get(name).cloned()
    }

    pub fn set_style(&self, property: &str, value: &str) {
        self.0
            .borrow_mut()
            .styles
            .insert(property.to_string(), value.to_string());
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.0.borrow().styles.get(property).cloned()
    }

    // --- content ---

    /// Replace all content with plain text.
    pub fn set_text(&self, text: &str) {
        let mut node = self.0.borrow_mut();
        node.children.clear();
        node.html = None;
        node.text = text.to_string();
    }

    /// Replace all content with raw, unsanitized markup.
    pub fn set_inner_html(&self, html: &str) {
        let mut node = self.0.borrow_mut();
        node.children.clear();
        node.text.clear();
        node.html = Some(html.to_string());
    }

    /// Own text followed by the text of every descendant, in order.
    pub fn text_content(&self) -> String {
        let node = self.0.borrow();
        let mut out = node.text.clone();
        if let Some(html) = &node.html {
            out.push_str(html);
        }
        for child in &node.children {
            out.push_str(&child.text_content());
        }
        out
    }

    pub fn append_child(&self, child: Element) {
        self.0.borrow_mut().children.push(child);
    }

    pub fn remove_child(&self, child: &Element) {
        self.0
            .borrow_mut()
            .children
            .retain(|c| !c.same_node(child));
    }

    pub fn children(&self) -> Vec<Element> {
        self.0.borrow().children.clone()
    }

    /// First direct child carrying `class`.
    pub fn child_with_class(&self, class: &str) -> Option<Element> {
        self.0
            .borrow()
            .children
            .iter()
            .find(|c| c.has_class(class))
            .cloned()
    }

    /// All descendants in document (pre-)order, excluding `self`.
    pub fn descendants(&self) -> Vec<Element> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    /// Descendants with the given tag, in document order.
    pub fn query_all(&self, tag: &str) -> Vec<Element> {
        self.descendants()
            .into_iter()
            .filter(|el| el.0.borrow().tag == tag)
            .collect()
    }

    /// Serialize to HTML-like markup, for display and debugging.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_html(self, &mut out);
        out
    }
}

impl WeakElement {
    pub fn upgrade(&self) -> Option<Element> {
        self.0.upgrade().map(Element)
    }

    /// Whether this handle still points at `el`.
    pub fn is(&self, el: &Element) -> bool {
        self.0.upgrade().is_some_and(|rc| Rc::ptr_eq(&rc, &el.0))
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.same_node(other)
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Element({})", self.to_html())
    }
}

fn collect_descendants(el: &Element, out: &mut Vec<Element>) {
    for child in el.children() {
        out.push(child.clone());
        collect_descendants(&child, out);
    }
}

fn write_html(el: &Element, out: &mut String) {
    let node = el.0.borrow();
    let _ = write!(out, "<{}", node.tag);
    if !node.classes.is_empty() {
        let _ = write!(out, " class=\"{}\"", escape(&node.classes.join(" ")));
    }
    for (name, value) in &node.attributes {
        let _ = write!(out, " {}=\"{}\"", name, escape(value));
    }
    if !node.styles.is_empty() {
        let style: Vec<String> = node
            .styles
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect();
        let _ = write!(out, " style=\"{}\"", escape(&style.join("; ")));
    }
    out.push('>');
    out.push_str(&escape(&node.text));
    if let Some(html) = &node.html {
        out.push_str(html);
    }
    for child in &node.children {
        write_html(child, out);
    }
    let _ = write!(out, "</{}>", node.tag);
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
