use std::time::Duration;

use super::links::extract_links;
use super::normalize::EntryNormalizer;
use super::types::{ChannelMetadata, Feed};
use crate::auth::{Credentials, TokenManager};
use crate::config::Endpoints;
use crate::error::BridgeError;
use crate::storage::TokenCache;
use crate::timeline::{RawTimelineRecord, TimelineFetcher, TimelineQuery};
use crate::util::decode_entities;

/// Which kinds of status to include besides the account's own posts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedOptions {
    pub include_replies: bool,
    pub include_retweets: bool,
}

/// Runs the whole pipeline: token, timeline fetch, normalization.
pub struct FeedAssembler<'a> {
    client: &'a reqwest::Client,
    cache: &'a dyn TokenCache,
    endpoints: &'a Endpoints,
    timeout: Duration,
}

impl<'a> FeedAssembler<'a> {
    pub fn new(
        client: &'a reqwest::Client,
        cache: &'a dyn TokenCache,
        endpoints: &'a Endpoints,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            endpoints,
            timeout,
        }
    }

    /// Builds the feed for `screen_name`.
    ///
    /// Credentials and the screen name are validated before any cache or
    /// network access. Every failure aborts the run; no partial feed is
    /// returned.
    pub async fn build_feed(
        &self,
        screen_name: &str,
        options: FeedOptions,
        credentials: &Credentials,
    ) -> Result<Feed, BridgeError> {
        credentials.expose()?;
        let screen_name = screen_name.trim();
        if screen_name.is_empty() {
            return Err(BridgeError::MissingScreenName);
        }

        let token = TokenManager::new(
            self.client,
            self.cache,
            self.endpoints.token_url(),
            self.timeout,
        )
        .get_token(credentials)
        .await?;

        let query = TimelineQuery {
            screen_name,
            include_replies: options.include_replies,
            include_retweets: options.include_retweets,
        };
        let page = TimelineFetcher::new(self.client, self.endpoints.timeline_url(), self.timeout)
            .fetch_timeline(&token, &query)
            .await?;

        assemble(screen_name, &page.records, self.endpoints)
    }
}

/// Turns decoded records into a feed, preserving their order.
///
/// Fails with [`BridgeError::EmptyResult`] when there are no records, which
/// happens when every element of a non-empty timeline was undecodable.
pub fn assemble(
    screen_name: &str,
    records: &[RawTimelineRecord],
    endpoints: &Endpoints,
) -> Result<Feed, BridgeError> {
    if records.is_empty() {
        return Err(BridgeError::EmptyResult);
    }

    let normalizer = EntryNormalizer::new(endpoints);
    let channel = channel_metadata(screen_name, records, &normalizer, endpoints);

    let items = records
        .iter()
        .map(|record| {
            let (links, image) = extract_links(record);
            normalizer.normalize(record, &links, image.as_deref(), &channel.title)
        })
        .collect::<Vec<_>>();

    tracing::info!(
        screen_name = %screen_name,
        channel = %channel.title,
        items = items.len(),
        "Assembled feed"
    );

    Ok(Feed { channel, items })
}

/// Channel details from the first record whose user has a display name.
fn channel_metadata(
    screen_name: &str,
    records: &[RawTimelineRecord],
    normalizer: &EntryNormalizer<'_>,
    endpoints: &Endpoints,
) -> ChannelMetadata {
    let link = endpoints.account_link(screen_name);
    let user = records
        .iter()
        .filter_map(|record| record.user.as_ref())
        .find_map(|user| user.name().map(|name| (user, name)));

    match user {
        Some((user, name)) => ChannelMetadata {
            title: name.to_string(),
            description: user
                .description()
                .map(|text| normalizer.linkifier().render(&decode_entities(text))),
            icon: user.image_url().map(str::to_string),
            link,
        },
        None => {
            tracing::debug!(screen_name = %screen_name, "No record names the user, using screen name");
            ChannelMetadata {
                title: screen_name.to_string(),
                description: None,
                icon: None,
                link,
            }
        }
    }
}
