//! Timeline retrieval: the authenticated `user_timeline` request and the raw
//! record shapes it returns.

mod fetcher;
mod record;

pub use fetcher::{
    decode_timeline, FetchError, TimelineFetcher, TimelinePage, TimelineQuery, TIMELINE_COUNT,
};
pub(crate) use fetcher::read_limited_bytes;
pub use record::{Entities, MediaEntity, RawTimelineRecord, UrlEntity, UserProfile};
pub(crate) use record::non_empty;
