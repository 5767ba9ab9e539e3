//! Word-cloud preparation for chat exports.
//!
//! Uploads (chat-export CSV or styled JSON word lists) are merged into a
//! [`Session`]; the session's counts are turned into sized, colored
//! [`DisplayItem`]s, filtered and ranked by a [`ScoringPolicy`], and handed
//! to a [`LayoutAdapter`] for placement. The [`fetch`] module produces
//! chat-export CSV from a Slack channel.

pub mod aggregate;
pub mod cloud;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod ingest;
pub mod layout;
pub mod policy;
pub mod sources;
mod util;

pub use aggregate::{MessageFilter, Session, WordCountMap, WordStyleMap};
pub use cloud::{CloudBuilder, DisplayItem};
pub use config::Config;
pub use error::{FetchError, IngestError};
pub use export::WordCloudData;
pub use fetch::{ChannelFetcher, SlackClient};
pub use ingest::Uploader;
pub use layout::{LayoutAdapter, LayoutRequest, PlacedItem};
pub use policy::ScoringPolicy;

/// The ranked, capped items for the session's current state.
pub fn prepare_cloud(
    session: &Session,
    builder: &CloudBuilder,
    policy: &ScoringPolicy,
) -> Vec<DisplayItem> {
    policy.rank(&session.counts(), &session.styles(), builder)
}
