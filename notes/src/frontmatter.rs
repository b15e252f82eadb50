use serde::Deserialize;
use serde_yaml::Value;

use crate::error::ParseError;

/// The front matter keys this crate understands. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
struct RawFrontMatter {
    #[serde(default)]
    require: Option<Value>,
}

/// Parsed document front matter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    /// Link targets named by `require`, brackets and aliases removed.
    pub require: Vec<String>,
}

/// Locate the YAML block at the start of a document.
///
/// Returns the YAML text and its byte offset in `content`, or `None` when the
/// document has no complete `---` delimited block.
pub fn split_front_matter(content: &str) -> Option<(&str, usize)> {
    let bom = if content.starts_with('\u{feff}') { '\u{feff}'.len_utf8() } else { 0 };
    let body = &content[bom..];

    let first_line_end = body.find('\n')?;
    if body[..first_line_end].trim_end() != "---" {
        return None;
    }

    let yaml_start = first_line_end + 1;
    let mut offset = yaml_start;
    for line in body[yaml_start..].split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Some((&body[yaml_start..offset], bom + yaml_start));
        }
        offset += line.len();
    }
    None
}

/// Read the front matter of a document.
pub fn parse_front_matter(content: &str) -> Result<FrontMatter, ParseError> {
    let Some((yaml, offset)) = split_front_matter(content) else {
        return Ok(FrontMatter::default());
    };
    if yaml.trim().is_empty() {
        return Ok(FrontMatter::default());
    }

    let raw: RawFrontMatter = serde_yaml::from_str(yaml).map_err(|e| {
        let span = match e.location() {
            Some(loc) => {
                let start = offset + loc.index();
                start..(start + 1).min(offset + yaml.len())
            }
            None => offset..offset + yaml.len(),
        };
        ParseError::error(format!("invalid front matter: {}", e), span)
    })?;

    let mut require = Vec::new();
    if let Some(value) = &raw.require {
        collect_links(value, &mut require).map_err(|message| {
            ParseError::error(message, offset..offset + yaml.len())
                .with_note("`require` takes a link or a list of links, e.g. require: \"[[Other note]]\"")
        })?;
    }

    Ok(FrontMatter { require })
}

/// Flatten a `require` value into link targets.
///
/// Unquoted `[[Note]]` is read by YAML as a list holding a list, so nested
/// sequences are flattened rather than rejected.
fn collect_links(value: &Value, out: &mut Vec<String>) -> Result<(), String> {
    match value {
        Value::Null => Ok(()),
        Value::String(s) => {
            let link = link_target(s);
            if !link.is_empty() {
                out.push(link.to_string());
            }
            Ok(())
        }
        Value::Sequence(items) => {
            for item in items {
                collect_links(item, out)?;
            }
            Ok(())
        }
        other => Err(format!(
            "unsupported `require` entry: {}",
            serde_yaml::to_string(other).unwrap_or_default().trim()
        )),
    }
}

/// Strip wiki-link syntax: `[[Note#Heading|alias]]` becomes `Note`.
pub fn link_target(link: &str) -> &str {
    let link = link.trim();
    let link = link
        .strip_prefix("[[")
        .and_then(|l| l.strip_suffix("]]"))
        .unwrap_or(link);
    let link = link.split('|').next().unwrap_or(link);
    let link = link.split('#').next().unwrap_or(link);
    link.trim()
}
