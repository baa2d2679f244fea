//! Protobuf parser for GTFS Realtime feeds.

use prost::Message;

use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, prost::DecodeError> {
    FeedMessage::decode(bytes)
}

/// Returns the feed header timestamp (seconds since epoch).
///
/// An absent timestamp and a zero timestamp are both reported as `None`.
pub fn header_timestamp(feed: &FeedMessage) -> Option<u64> {
    feed.header.timestamp.filter(|&ts| ts != 0)
}
