//! Utility functions shared by the feed pipeline and the binary.
//!
//! - **Text processing**: HTML escaping, entity decoding, tag stripping
//! - **Files**: atomic writes for generated feed documents
//!
//! # Examples
//!
//! ```
//! use tweetfeed::util::{decode_entities, escape_html, strip_tags};
//!
//! assert_eq!(strip_tags("<b>bold</b>"), "bold");
//! assert_eq!(decode_entities("Q&amp;A"), "Q&A");
//! assert_eq!(escape_html("Q&A"), "Q&amp;A");
//! ```

mod entities;
mod fs;
mod text;

pub use fs::write_atomic;
pub use text::{decode_entities, escape_html, nl2br, strip_tags, trim_space};
