use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser as CmarkParser, Tag, TagEnd};

/// A top-level rendered region of a document, as a host would emit it.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// First line of the section (0-based).
    pub line_start: usize,
    /// Last line of the section, inclusive.
    pub line_end: usize,
    pub kind: SectionKind,
    /// Byte span in source.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionKind {
    /// A fenced or indented code block.
    Code {
        language: Option<String>,
        content: String,
    },
    /// Any other block: paragraphs, headings, lists, quotes, tables.
    Text {
        /// Text fragments in order; inline code spans are kept separate.
        fragments: Vec<Fragment>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    Code(String),
}

impl Section {
    /// Inline code span contents in this section, in order.
    pub fn inline_code(&self) -> impl Iterator<Item = &str> {
        let fragments: &[Fragment] = match &self.kind {
            SectionKind::Text { fragments } => fragments,
            SectionKind::Code { .. } => &[],
        };
        fragments.iter().filter_map(|f| match f {
            Fragment::Code(code) => Some(code.as_str()),
            Fragment::Text(_) => None,
        })
    }
}

/// Split markdown into top-level sections. Front matter is skipped.
pub fn split_sections(source: &str) -> Vec<Section> {
    let options = Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TABLES
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;
    let events: Vec<(Event<'_>, Range<usize>)> =
        CmarkParser::new_ext(source, options).into_offset_iter().collect();

    let line_starts = line_starts(source);
    let mut sections = Vec::new();
    let mut i = 0;

    while i < events.len() {
        let (ref ev, ref range) = events[i];
        match ev {
            Event::Start(Tag::MetadataBlock(_)) => {
                i = skip_to_end(&events, i);
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(lang) => {
                        let lang = lang.split_whitespace().next().unwrap_or("").to_string();
                        if lang.is_empty() { None } else { Some(lang) }
                    }
                    CodeBlockKind::Indented => None,
                };
                let end = skip_to_end(&events, i);
                let content = events[i + 1..end - 1]
                    .iter()
                    .filter_map(|(e, _)| match e {
                        Event::Text(s) => Some(s.as_ref()),
                        _ => None,
                    })
                    .collect::<String>();
                sections.push(section(
                    &line_starts,
                    range.clone(),
                    SectionKind::Code { language, content },
                ));
                i = end;
            }
            Event::Start(_) => {
                let end = skip_to_end(&events, i);
                let fragments = collect_fragments(&events[i + 1..end - 1]);
                sections.push(section(&line_starts, range.clone(), SectionKind::Text { fragments }));
                i = end;
            }
            Event::Rule | Event::Html(_) => {
                sections.push(section(
                    &line_starts,
                    range.clone(),
                    SectionKind::Text { fragments: Vec::new() },
                ));
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    sections
}

/// Index one past the `End` event that closes the `Start` at `start`.
fn skip_to_end(events: &[(Event<'_>, Range<usize>)], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < events.len() {
        match events[i].0 {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    events.len()
}

fn collect_fragments(events: &[(Event<'_>, Range<usize>)]) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    for (ev, _) in events {
        match ev {
            Event::Text(s) => match fragments.last_mut() {
                Some(Fragment::Text(prev)) => prev.push_str(s),
                _ => fragments.push(Fragment::Text(s.to_string())),
            },
            Event::Code(s) => fragments.push(Fragment::Code(s.to_string())),
            Event::SoftBreak | Event::HardBreak | Event::End(TagEnd::Paragraph) => {
                match fragments.last_mut() {
                    Some(Fragment::Text(prev)) => prev.push('\n'),
                    _ => fragments.push(Fragment::Text("\n".to_string())),
                }
            }
            _ => {}
        }
    }
    fragments
}

fn section(line_starts: &[usize], span: Range<usize>, kind: SectionKind) -> Section {
    let line_start = line_of(line_starts, span.start);
    // The span usually ends just past a newline; the last line is the one
    // holding the final byte.
    let line_end = line_of(line_starts, span.end.saturating_sub(1).max(span.start));
    Section {
        line_start,
        line_end,
        kind,
        span,
    }
}

fn line_starts(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

fn line_of(line_starts: &[usize], offset: usize) -> usize {
    match line_starts.binary_search(&offset) {
        Ok(line) => line,
        Err(next) => next - 1,
    }
}
