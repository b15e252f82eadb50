//! Document-side building blocks: code block extraction, front matter, and
//! the section layout a host renders a note into.

pub mod error;
pub mod extract;
pub mod frontmatter;
pub mod sections;
pub mod template;

pub use error::ParseError;
pub use extract::{BlockKind, CodeBlockDescriptor, INLINE_MARKER, extract_code_blocks};
pub use frontmatter::{FrontMatter, parse_front_matter};
pub use sections::{Fragment, Section, SectionKind, split_sections};
