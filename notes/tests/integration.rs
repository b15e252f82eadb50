use notes::frontmatter::{link_target, split_front_matter};
use notes::template::wrap_in_fence;
use notes::{
    BlockKind, CodeBlockDescriptor, Section, SectionKind, extract_code_blocks, parse_front_matter,
    split_sections,
};

fn extract(md: &str) -> Vec<CodeBlockDescriptor> {
    extract_code_blocks("clojure", md)
}

fn summary(blocks: &[CodeBlockDescriptor]) -> Vec<(&str, usize, usize, BlockKind)> {
    blocks
        .iter()
        .map(|b| (b.source.as_str(), b.line_start, b.line_end, b.kind))
        .collect()
}

fn requires(content: &str) -> Vec<String> {
    parse_front_matter(content).expect("front matter parses").require
}

fn lines(sections: &[Section]) -> Vec<(usize, usize)> {
    sections.iter().map(|s| (s.line_start, s.line_end)).collect()
}

// ---------------------------------------------------------------------------
// Code block extraction
// ---------------------------------------------------------------------------

#[test]
fn fenced_block() {
    let blocks = extract("```clojure\n(+ 1 2)\n```\n");
    assert_eq!(summary(&blocks), vec![("(+ 1 2)", 0, 2, BlockKind::Fenced)]);
}

#[test]
fn fenced_block_body_is_trimmed() {
    let blocks = extract("```clojure\n\n  (def x 1)\n(inc x)  \n\n```\n");
    assert_eq!(blocks[0].source, "(def x 1)\n(inc x)");
    assert_eq!((blocks[0].line_start, blocks[0].line_end), (0, 5));
}

#[test]
fn info_string_after_language_is_allowed() {
    assert_eq!(extract("```clojure {.numbered}\n1\n```\n").len(), 1);
    assert!(extract("```clojurescript\n1\n```\n").is_empty());
    assert!(extract("```python\n1\n```\n").is_empty());
}

#[test]
fn inline_blocks() {
    let blocks = extract("Sum is `|(+ 1 2)` and `| x ` but not `plain`.\n");
    assert_eq!(
        summary(&blocks),
        vec![
            ("(+ 1 2)", 0, 0, BlockKind::Inline),
            ("x", 0, 0, BlockKind::Inline),
        ]
    );
    assert!(blocks.iter().all(CodeBlockDescriptor::is_inline));
}

#[test]
fn blocks_come_in_source_order() {
    let md = "`|a`\n\n```clojure\nb\n```\n\nthen `|c`\n";
    assert_eq!(
        summary(&extract(md)),
        vec![
            ("a", 0, 0, BlockKind::Inline),
            ("b", 2, 4, BlockKind::Fenced),
            ("c", 6, 6, BlockKind::Inline),
        ]
    );
}

#[test]
fn inline_markers_inside_a_fence_belong_to_the_fence() {
    let blocks = extract("```clojure\n`|x`\n```\n");
    assert_eq!(summary(&blocks), vec![("`|x`", 0, 2, BlockKind::Fenced)]);
}

#[test]
fn inline_markers_inside_other_language_fences_are_ignored() {
    assert!(extract("```python\nprint(`|x`)\n```\n").is_empty());

    let blocks = extract("```\n`|plain`\n```\n\n```python\n`|x`\n```\n\n```clojure\n(+ 1 2)\n```\n\n`|y`\n");
    assert_eq!(
        summary(&blocks),
        vec![
            ("(+ 1 2)", 8, 10, BlockKind::Fenced),
            ("y", 12, 12, BlockKind::Inline),
        ]
    );
}

#[test]
fn unterminated_fence_is_dropped() {
    assert!(extract("```clojure\n(+ 1 2)\n").is_empty());

    // Everything after the opening line is treated as fence body.
    let blocks = extract("`|a`\n```clojure\n(+ 1 2)\n`|b`\n");
    assert_eq!(summary(&blocks), vec![("a", 0, 0, BlockKind::Inline)]);
}

#[test]
fn within_checks_line_span() {
    let block = &extract("x\n\n```clojure\n1\n```\n")[0];
    assert!(block.within(2, 4));
    assert!(block.within(0, 10));
    assert!(!block.within(3, 4));
    assert!(!block.within(2, 3));
}

#[test]
fn inline_source_strips_marker() {
    assert_eq!(notes::extract::inline_source("| (+ 1 2) "), Some("(+ 1 2)"));
    assert_eq!(notes::extract::inline_source("(+ 1 2)"), None);
}

// ---------------------------------------------------------------------------
// Front matter
// ---------------------------------------------------------------------------

#[test]
fn no_front_matter_requires_nothing() {
    assert!(requires("# Title\n\nbody\n").is_empty());
    assert!(requires("").is_empty());
    assert!(requires("---\n---\nbody\n").is_empty());
    // An unclosed block is not front matter.
    assert!(requires("---\nrequire: a\n").is_empty());
}

#[test]
fn require_list_of_links() {
    let content = "---\ntitle: Notes\nrequire:\n  - \"[[Helpers]]\"\n  - \"[[lib/Math]]\"\n---\nbody\n";
    assert_eq!(requires(content), vec!["Helpers", "lib/Math"]);
}

#[test]
fn require_single_link() {
    assert_eq!(requires("---\nrequire: \"[[Helpers]]\"\n---\n"), vec!["Helpers"]);
    assert_eq!(requires("---\nrequire: Helpers\n---\n"), vec!["Helpers"]);
}

#[test]
fn unquoted_links_are_flattened() {
    assert_eq!(requires("---\nrequire:\n  - [[a]]\n  - [[b]]\n---\n"), vec!["a", "b"]);
    assert_eq!(requires("---\nrequire: [[a]]\n---\n"), vec!["a"]);
}

#[test]
fn link_aliases_and_headings_are_stripped() {
    assert_eq!(link_target("[[Note#Setup|the setup]]"), "Note");
    assert_eq!(link_target(" [[Note|alias]] "), "Note");
    assert_eq!(link_target("Plain"), "Plain");
    assert_eq!(requires("---\nrequire: [\"[[A#h]]\", \"\", null]\n---\n"), vec!["A"]);
}

#[test]
fn byte_order_mark_and_dots_closer() {
    let content = "\u{feff}---\nrequire: a\n...\nbody\n";
    assert_eq!(requires(content), vec!["a"]);

    let (yaml, offset) = split_front_matter(content).unwrap();
    assert_eq!(yaml, "require: a\n");
    assert_eq!(&content[offset..offset + yaml.len()], yaml);
}

#[test]
fn invalid_yaml_points_into_the_block() {
    let content = "---\nrequire: [unclosed\n---\nbody\n";
    let err = parse_front_matter(content).unwrap_err();
    assert!(err.message.starts_with("invalid front matter"));

    let (yaml, offset) = split_front_matter(content).unwrap();
    assert!(err.span.start >= offset);
    assert!(err.span.end <= offset + yaml.len());

    let diagnostic = err.to_diagnostic(0usize);
    assert_eq!(diagnostic.message, err.message);
    assert_eq!(diagnostic.labels[0].range, err.span);
}

#[test]
fn unsupported_require_entry_has_a_note() {
    let err = parse_front_matter("---\nrequire: 5\n---\n").unwrap_err();
    assert_eq!(err.message, "unsupported `require` entry: 5");
    assert_eq!(err.notes.len(), 1);
    assert_eq!(err.span, 4..15);
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[test]
fn sections_follow_top_level_blocks() {
    let md = "---\nrequire: x\n---\n# Title\n\nSome `|(+ 1 2)` text\n\n```clojure\n(def a 1)\n```\n";
    let sections = split_sections(md);
    assert_eq!(lines(&sections), vec![(3, 3), (5, 5), (7, 9)]);

    assert_eq!(sections[1].inline_code().collect::<Vec<_>>(), vec!["|(+ 1 2)"]);
    assert_eq!(
        sections[2].kind,
        SectionKind::Code {
            language: Some("clojure".to_string()),
            content: "(def a 1)\n".to_string(),
        }
    );
    assert_eq!(sections[2].inline_code().count(), 0);
}

#[test]
fn section_ranges_match_extracted_fences() {
    let md = "intro\n\n```clojure\n(+ 1 2)\n```\n\n- item `|a`\n- item `|b`\n";
    let sections = split_sections(md);
    let blocks = extract(md);

    let fence = &blocks[0];
    assert!(
        sections
            .iter()
            .any(|s| s.line_start == fence.line_start && s.line_end == fence.line_end)
    );

    let list = sections.last().unwrap();
    assert_eq!(list.inline_code().collect::<Vec<_>>(), vec!["|a", "|b"]);
    assert!(blocks[2].within(list.line_start, list.line_end));
}

// ---------------------------------------------------------------------------
// Fence template
// ---------------------------------------------------------------------------

#[test]
fn empty_fence_puts_cursor_inside() {
    let template = wrap_in_fence("clojure", None);
    assert_eq!(template.text, "```clojure\n\n```\n");
    assert_eq!(template.cursor_line, 1);
}

#[test]
fn selection_is_wrapped() {
    let template = wrap_in_fence("clojure", Some("(+ 1 2)"));
    assert_eq!(template.text, "```clojure\n(+ 1 2)\n```\n");
    assert_eq!(template.cursor_line, 3);

    let template = wrap_in_fence("clojure", Some("(def a 1)\n(inc a)"));
    assert_eq!(template.cursor_line, 4);
    assert_eq!(extract(&template.text)[0].source, "(def a 1)\n(inc a)");
}
