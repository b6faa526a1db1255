use std::fmt;
use std::fs::File;
use std::io::{BufReader, Write};

use chrono::Utc;

use crate::cli::{CliOptions, InsertOptions};
use crate::config::ConfigProperties;
use crate::engine::FileEngine;
use crate::error::AddContext;
use crate::feed::{CacheState, FeedItem};
use crate::store::{FeedStore, LocalFeedStore};
use crate::{log_info, Result};

pub fn execute<C: ConfigProperties, W: Write>(
    options: CliOptions,
    config: &C,
    writer: &mut W,
) -> Result<()> {
    let store = LocalFeedStore::from_config(config)?;
    match options {
        CliOptions::Retrieve => retrieve(&store, writer),
        CliOptions::Insert(options) => insert(&store, options, writer),
        CliOptions::Delete => {
            store.delete_cached_feed_blocking()?;
            writeln!(writer, "Cache deleted")?;
            Ok(())
        }
        CliOptions::Info => {
            let size = FileEngine::from_config(config)?.size()?;
            info(&store, config, size, writer)
        }
    }
}

fn retrieve<S: FeedStore, W: Write>(store: &S, writer: &mut W) -> Result<()> {
    match store.retrieve_blocking()? {
        CacheState::Empty => writeln!(writer, "empty")?,
        CacheState::Found(cached) => {
            writeln!(writer, "{}", serde_json::to_string_pretty(&cached)?)?;
        }
    }
    Ok(())
}

fn insert<S: FeedStore, W: Write>(store: &S, options: InsertOptions, writer: &mut W) -> Result<()> {
    let f = File::open(&options.file).err_context(format!("Unable to open {}", options.file))?;
    let feed: Vec<FeedItem> = serde_json::from_reader(BufReader::new(f))
        .err_context(format!("Unable to parse feed items in {}", options.file))?;
    let num_items = feed.len();
    let timestamp = options.timestamp.unwrap_or_else(Utc::now);
    log_info!("Inserting {} feed items from {}", num_items, options.file);
    store.insert_blocking(feed, timestamp)?;
    writeln!(
        writer,
        "Cached {} feed items at {}",
        num_items,
        timestamp.to_rfc3339()
    )?;
    Ok(())
}

fn info<S: FeedStore, C: ConfigProperties, W: Write>(
    store: &S,
    config: &C,
    size: u64,
    writer: &mut W,
) -> Result<()> {
    writeln!(writer, "Location: {}", config.store_location().unwrap_or_default())?;
    writeln!(writer, "Size: {}", BytesToHumanReadable::from(size))?;
    match store.retrieve_blocking()? {
        CacheState::Empty => writeln!(writer, "Cached feed: none")?,
        CacheState::Found(cached) => {
            writeln!(writer, "Cached feed: {} items", cached.feed.len())?;
            writeln!(writer, "Timestamp: {}", cached.timestamp.to_rfc3339())?;
        }
    }
    Ok(())
}

struct BytesToHumanReadable(u64);

impl From<u64> for BytesToHumanReadable {
    fn from(size: u64) -> Self {
        BytesToHumanReadable(size)
    }
}

impl fmt::Display for BytesToHumanReadable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let size = self.0;
        let suffixes = ["B", "KB", "MB", "GB"];
        let suffix_len = suffixes.len();
        let mut size = size as f64;
        let mut i = 0;
        while size >= 1024.0 && i < suffix_len - 1 {
            size /= 1024.0;
            i += 1;
        }
        write!(f, "{:.2} {}", size, suffixes[i])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::error::FeedStoreError;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    #[test]
    fn test_bytes_display() {
        let test_table = vec![
            (0, "0.00 B"),
            (1024, "1.00 KB"),
            (1024 * 1024, "1.00 MB"),
            (1024 * 1024 * 1024, "1.00 GB"),
        ];
        for (size, expected) in test_table {
            let actual = BytesToHumanReadable::from(size).to_string();
            assert_eq!(expected, actual);
        }
    }

    struct ConfigMock {
        store_file: String,
    }

    impl ConfigMock {
        fn new(tmp_dir: &TempDir) -> Self {
            Self {
                store_file: tmp_dir
                    .path()
                    .join("feed.store")
                    .to_str()
                    .unwrap()
                    .to_string(),
            }
        }
    }

    impl ConfigProperties for ConfigMock {
        fn store_location(&self) -> Option<&str> {
            Some(&self.store_file)
        }
    }

    fn run(options: CliOptions, config: &ConfigMock) -> Result<String> {
        let mut out = Vec::new();
        execute(options, config, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn write_feed_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("feed.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "00000000-0000-0000-0000-000000000002", "url": "https://example.com/b"},
                {"id": "00000000-0000-0000-0000-000000000001", "description": "first", "url": "https://example.com/a"}
            ]"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_retrieve_on_empty_store() {
        let dir = tempdir().unwrap();
        let config = ConfigMock::new(&dir);
        assert_eq!("empty\n", run(CliOptions::Retrieve, &config).unwrap());
    }

    #[test]
    fn test_insert_then_retrieve_then_delete() {
        let dir = tempdir().unwrap();
        let config = ConfigMock::new(&dir);
        let feed_file = write_feed_file(&dir);
        let timestamp = chrono::DateTime::parse_from_rfc3339("2024-01-13T19:50:23Z")
            .unwrap()
            .with_timezone(&Utc);

        let out = run(
            CliOptions::Insert(InsertOptions {
                file: feed_file.to_str().unwrap().to_string(),
                timestamp: Some(timestamp),
            }),
            &config,
        )
        .unwrap();
        assert_eq!("Cached 2 feed items at 2024-01-13T19:50:23+00:00\n", out);

        let out = run(CliOptions::Retrieve, &config).unwrap();
        let cached: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            "00000000-0000-0000-0000-000000000002",
            cached["feed"][0]["id"]
        );
        assert_eq!("first", cached["feed"][1]["description"]);

        let out = run(CliOptions::Info, &config).unwrap();
        assert!(out.contains("Cached feed: 2 items"));
        assert!(out.contains("Timestamp: 2024-01-13T19:50:23+00:00"));

        assert_eq!("Cache deleted\n", run(CliOptions::Delete, &config).unwrap());
        assert_eq!("empty\n", run(CliOptions::Retrieve, &config).unwrap());
    }

    #[test]
    fn test_info_on_empty_store() {
        let dir = tempdir().unwrap();
        let config = ConfigMock::new(&dir);
        let out = run(CliOptions::Info, &config).unwrap();
        assert!(out.contains(&format!("Location: {}", config.store_file)));
        assert!(out.contains("Size: 0.00 B"));
        assert!(out.contains("Cached feed: none"));
    }

    #[test]
    fn test_insert_missing_file_is_err() {
        let dir = tempdir().unwrap();
        let config = ConfigMock::new(&dir);
        let options = CliOptions::Insert(InsertOptions {
            file: "/non/existent/feed.json".to_string(),
            timestamp: None,
        });
        assert!(run(options, &config).is_err());
    }

    #[test]
    fn test_insert_malformed_feed_leaves_cache_untouched() {
        let dir = tempdir().unwrap();
        let config = ConfigMock::new(&dir);
        let feed_file = write_feed_file(&dir);
        run(
            CliOptions::Insert(InsertOptions {
                file: feed_file.to_str().unwrap().to_string(),
                timestamp: None,
            }),
            &config,
        )
        .unwrap();

        let bad_file = dir.path().join("bad.json");
        std::fs::write(&bad_file, r#"[{"id": "not-a-uuid", "url": "https://example.com"}]"#)
            .unwrap();
        let options = CliOptions::Insert(InsertOptions {
            file: bad_file.to_str().unwrap().to_string(),
            timestamp: None,
        });
        assert!(run(options, &config).is_err());
        assert!(run(CliOptions::Info, &config)
            .unwrap()
            .contains("Cached feed: 2 items"));
    }

    #[test]
    fn test_missing_store_directory_is_err() {
        let config = ConfigMock {
            store_file: "/non/existent/directory/feed.store".to_string(),
        };
        let err = run(CliOptions::Retrieve, &config).unwrap_err();
        match err.downcast_ref::<FeedStoreError>() {
            Some(FeedStoreError::StoreLocationDoesNotExist(msg)) => {
                assert!(msg.contains("/non/existent/directory"));
            }
            _ => panic!("Expected StoreLocationDoesNotExist error"),
        }
    }
}
