use std::rc::Rc;

use crate::dom::Element;

/// Turns untrusted HTML into a safe element tree.
pub type Sanitizer = Rc<dyn Fn(&str) -> Element>;

/// Fallback sanitizer: keeps only the text of the markup.
///
/// Tags are dropped, and so is everything inside `<script>` and `<style>`.
/// Hosts with a real sanitizer should inject it instead.
pub fn text_only(html: &str) -> Element {
    let mut text = String::new();
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let after = &rest[open..];
        let Some(close) = after.find('>') else {
            rest = "";
            break;
        };
        let tag = after[1..close].trim().to_ascii_lowercase();
        rest = &after[close + 1..];

        for skipped in ["script", "style"] {
            if tag == skipped || tag.starts_with(&format!("{} ", skipped)) {
                let end_tag = format!("</{}", skipped);
                rest = match rest.to_ascii_lowercase().find(&end_tag) {
                    Some(pos) => {
                        let tail = &rest[pos..];
                        tail.find('>').map_or("", |gt| &tail[gt + 1..])
                    }
                    None => "",
                };
            }
        }
    }
    text.push_str(rest);

    Element::with_text("div", &decode_entities(&text))
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
