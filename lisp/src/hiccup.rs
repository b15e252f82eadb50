use evaluator::Element;

use crate::error::LispError;
use crate::value::Value;

/// Build an element tree from a hiccup form such as
/// `[:div.note {:style {:color "red"}} "text" [:b "bold"]]`.
///
/// The tag keyword may carry `.class` and `#id` suffixes. Strings and other
/// scalars become text; nested lists are spliced into the parent.
pub fn to_element(form: &Value) -> Result<Element, LispError> {
    let Value::Vector(items) = form else {
        return Err(LispError::TypeError {
            expected: "a hiccup vector".to_string(),
            got: form.pr_str(),
        });
    };
    let Some((Value::Keyword(tag), rest)) = items.split_first() else {
        return Err(LispError::TypeError {
            expected: "a keyword tag".to_string(),
            got: items.first().map_or("nothing".to_string(), Value::pr_str),
        });
    };

    let el = element_for_tag(tag);
    let children = match rest.split_first() {
        Some((Value::Map(attributes), children)) => {
            apply_attributes(&el, attributes)?;
            children
        }
        _ => rest,
    };

    append_children(&el, children)?;
    Ok(el)
}

fn element_for_tag(tag: &str) -> Element {
    let name_end = tag.find(['.', '#']).unwrap_or(tag.len());
    let el = Element::new(&tag[..name_end]);

    let mut rest = &tag[name_end..];
    while !rest.is_empty() {
        let marker = &rest[..1];
        let body = &rest[1..];
        let end = body.find(['.', '#']).unwrap_or(body.len());
        match marker {
            "." => el.add_class(&body[..end]),
            _ => el.set_attribute("id", &body[..end]),
        }
        rest = &body[end..];
    }
    el
}

fn apply_attributes(el: &Element, attributes: &[(Value, Value)]) -> Result<(), LispError> {
    for (key, value) in attributes {
        let name = attribute_name(key)?;
        match (name.as_str(), value) {
            ("style", Value::Map(styles)) => {
                for (property, v) in styles {
                    el.set_style(&attribute_name(property)?, &v.to_string());
                }
            }
            ("class", Value::Vector(classes)) => {
                for class in classes {
                    el.add_class(&class.to_string());
                }
            }
            ("class", value) => {
                for class in value.to_string().split_whitespace() {
                    el.add_class(class);
                }
            }
            (_, Value::Nil | Value::Boolean(false)) => {}
            (name, value) => el.set_attribute(name, &value.to_string()),
        }
    }
    Ok(())
}

fn attribute_name(key: &Value) -> Result<String, LispError> {
    match key {
        Value::Keyword(name) | Value::String(name) | Value::Symbol(name) => Ok(name.clone()),
        other => Err(LispError::TypeError {
            expected: "a keyword attribute name".to_string(),
            got: other.pr_str(),
        }),
    }
}

fn append_children(el: &Element, children: &[Value]) -> Result<(), LispError> {
    // A lone text child becomes the element's own text.
    if let [child] = children {
        if !matches!(child, Value::Vector(_) | Value::List(_)) {
            el.set_text(&child.to_string());
            return Ok(());
        }
    }

    append_each(el, children)
}

fn append_each(el: &Element, children: &[Value]) -> Result<(), LispError> {
    for child in children {
        match child {
            Value::Vector(_) => el.append_child(to_element(child)?),
            Value::List(items) => append_each(el, items)?,
            Value::Nil => {}
            other => el.append_child(Element::with_text("span", &other.to_string())),
        }
    }
    Ok(())
}
