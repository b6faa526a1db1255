//! Translation between feed items and their persisted records.
//!
//! Engines are free to hand records back in any order, so every record is
//! tagged with its position in the feed on write, and records are sorted by
//! that position on read. Mapping is all or nothing: any record that cannot
//! be mapped fails the whole feed.

use url::Url;

use crate::engine::FeedItemRecord;
use crate::error::FeedStoreError;
use crate::feed::FeedItem;
use crate::Result;

pub fn to_persisted(feed: &[FeedItem]) -> Result<Vec<FeedItemRecord>> {
    feed.iter()
        .enumerate()
        .map(|(index, item)| {
            Ok(FeedItemRecord {
                id: item.id(),
                description: item.description().map(str::to_string),
                location: item.location().map(str::to_string),
                url: item.url().to_string(),
                position: position(index)?,
            })
        })
        .collect()
}

pub fn to_domain(mut records: Vec<FeedItemRecord>) -> Result<Vec<FeedItem>> {
    records.sort_by_key(|record| record.position);
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            // After sorting, positions must be exactly 0..n-1. Anything else
            // means items were lost or duplicated in storage.
            if position(index)? != record.position {
                return Err(FeedStoreError::Mapping(format!(
                    "Expected feed item at position {index}, found position {}",
                    record.position
                ))
                .into());
            }
            let url = Url::parse(&record.url).map_err(|err| {
                FeedStoreError::Mapping(format!("Invalid feed item url {}: {err}", record.url))
            })?;
            Ok(FeedItem::new(record.id, record.description, record.location, url))
        })
        .collect()
}

fn position(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| {
        FeedStoreError::Mapping(format!("Feed item index {index} exceeds the maximum position"))
            .into()
    })
}
