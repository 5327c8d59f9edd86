//! Feed construction: link extraction, titles, HTML rendering, assembly and
//! the Atom/JSON writers.

mod assemble;
mod atom;
mod json;
mod linkify;
mod links;
mod normalize;
mod title;
mod types;

pub use assemble::{assemble, FeedAssembler, FeedOptions};
pub use atom::to_atom;
pub use json::to_json;
pub use linkify::{sanitize, Html, TextLinkifier};
pub use links::{extract_links, LinkTable};
pub use normalize::{item_id, EntryNormalizer};
pub use title::derive_title;
pub use types::{ChannelMetadata, Feed, FeedItem};
