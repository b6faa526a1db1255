use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::config::ConfigProperties;
use crate::defaults::{STORE_FILE_HEADER, STORE_TMP_SUFFIX};
use crate::engine::{CacheRecord, EntityKind, StorageEngine};
use crate::error::{AddContext, FeedStoreError};
use crate::{log_debug, log_warn, Result};

/// Engine persisting the cache record to a single gzip compressed file. The
/// file holds a format header line, the hex SHA-256 of the payload and the
/// JSON payload.
pub struct FileEngine {
    path: PathBuf,
    compression: Compression,
    staged: Option<CacheRecord>,
}

impl FileEngine {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileEngine {
            path: path.into(),
            compression: Compression::default(),
            staged: None,
        }
    }

    pub fn from_config<C: ConfigProperties + ?Sized>(config: &C) -> Result<Self> {
        let location = config
            .store_location()
            .ok_or(FeedStoreError::ConfigurationError(
                "No store location found in config".to_string(),
            ))?;
        Ok(FileEngine::new(location).with_compression(config.compression().into()))
    }

    pub fn with_compression(self, compression: Compression) -> Self {
        FileEngine {
            compression,
            ..self
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks the directory holding the store file exists and is writeable.
    pub fn validate_store_location(&self) -> Result<()> {
        let location = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let display = location.to_string_lossy();

        if !location.exists() {
            return Err(FeedStoreError::StoreLocationDoesNotExist(format!(
                "Store directory does not exist: {display}"
            ))
            .into());
        }

        if !location.is_dir() {
            return Err(FeedStoreError::StoreLocationIsNotADirectory(format!(
                "Store location is not a directory: {display}"
            ))
            .into());
        }

        // Check if we can write to the directory
        let test_file_path = location.join(".write_test_store_file");
        match File::create(&test_file_path) {
            Ok(_) => {
                if let Err(e) = fs::remove_file(&test_file_path) {
                    return Err(FeedStoreError::StoreLocationIsNotWriteable(format!(
                        "Failed to remove store test file {}: {}",
                        test_file_path.to_string_lossy(),
                        e
                    ))
                    .into());
                }
            }
            Err(e) => {
                return Err(FeedStoreError::StoreLocationIsNotWriteable(format!(
                    "No write permission for store directory {display}: {e}"
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Size in bytes of the store file, zero if there is none.
    pub fn size(&self) -> Result<u64> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.len()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(STORE_TMP_SUFFIX);
        PathBuf::from(tmp)
    }

    fn read_store_data(&self, reader: impl BufRead) -> Result<CacheRecord> {
        let decompressed_data = GzDecoder::new(reader);
        let mut reader = BufReader::new(decompressed_data);
        let mut header = String::new();
        reader.read_line(&mut header)?;
        if header.trim_end() != STORE_FILE_HEADER {
            return Err(FeedStoreError::CorruptStoreFile(format!(
                "Unknown store file header: {}",
                header.trim_end()
            ))
            .into());
        }
        let mut checksum = String::new();
        reader.read_line(&mut checksum)?;
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        if checksum.trim_end() != payload_checksum(&payload) {
            return Err(FeedStoreError::CorruptStoreFile(
                "Checksum mismatch".to_string(),
            )
            .into());
        }
        let record = serde_json::from_slice::<CacheRecord>(&payload)
            .map_err(|err| FeedStoreError::CorruptStoreFile(err.to_string()))?;
        Ok(record)
    }

    fn persist_store_data(&self, record: &CacheRecord, writer: impl Write) -> Result<()> {
        let payload = serde_json::to_vec(record)?;
        let mut encoder = GzEncoder::new(writer, self.compression);
        writeln!(encoder, "{STORE_FILE_HEADER}")?;
        writeln!(encoder, "{}", payload_checksum(&payload))?;
        encoder.write_all(&payload)?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        Ok(())
    }

    /// Writes `record` next to the store file and renames it into place, so
    /// readers see either the old file or the complete new one.
    fn write_atomically(&self, record: &CacheRecord) -> Result<()> {
        let tmp_path = self.tmp_path();
        let result = File::create(&tmp_path)
            .map_err(anyhow::Error::from)
            .and_then(|f| {
                let mut f = BufWriter::new(f);
                self.persist_store_data(record, &mut f)?;
                f.into_inner().map_err(|err| err.into_error())?.sync_all()?;
                fs::rename(&tmp_path, &self.path)?;
                Ok(())
            });
        if result.is_err() {
            if let Err(err) = remove_if_exists(&tmp_path) {
                log_warn!("Unable to remove {}: {err}", tmp_path.to_string_lossy());
            }
        }
        result
    }
}

fn payload_checksum(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    let hash = hasher.finalize();
    format!("{hash:x}")
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

impl StorageEngine for FileEngine {
    fn fetch(&mut self) -> Result<Option<CacheRecord>> {
        match File::open(&self.path) {
            Ok(f) => {
                let record = self
                    .read_store_data(BufReader::new(f))
                    .err_context(format!("Reading {}", self.path.to_string_lossy()))?;
                Ok(Some(record))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn delete_all(&mut self, kind: EntityKind) -> Result<()> {
        match kind {
            EntityKind::Cache => {
                log_debug!("Removing store file {}", self.path.to_string_lossy());
                remove_if_exists(&self.path)?;
            }
            EntityKind::FeedItem => {
                if let Some(mut record) = self.fetch()? {
                    record.feed.clear();
                    self.write_atomically(&record)?;
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, record: CacheRecord) {
        self.staged = Some(record);
    }

    fn has_changes(&self) -> bool {
        self.staged.is_some()
    }

    fn save(&mut self) -> Result<()> {
        let Some(record) = self.staged.as_ref() else {
            return Ok(());
        };
        log_debug!(
            "Saving {} feed items to {}",
            record.feed.len(),
            self.path.to_string_lossy()
        );
        self.write_atomically(record)?;
        self.staged = None;
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FeedItemRecord;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    struct ConfigMock {
        location: Option<&'static str>,
    }

    impl ConfigProperties for ConfigMock {
        fn store_location(&self) -> Option<&str> {
            self.location
        }
    }

    fn record() -> CacheRecord {
        CacheRecord::new(
            Utc.timestamp_opt(1_600_000_000, 123_456_789).unwrap(),
            vec![
                FeedItemRecord {
                    id: Uuid::new_v4(),
                    description: Some("a description".to_string()),
                    location: None,
                    url: "https://example.com/a".to_string(),
                    position: 0,
                },
                FeedItemRecord {
                    id: Uuid::new_v4(),
                    description: None,
                    location: Some("a location".to_string()),
                    url: "https://example.com/b".to_string(),
                    position: 1,
                },
            ],
        )
    }

    fn encoded(engine: &FileEngine, record: &CacheRecord) -> Vec<u8> {
        let mut data = Vec::new();
        engine.persist_store_data(record, &mut data).unwrap();
        data
    }

    fn gzip(data: &str) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data.as_bytes()).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_tmp_path_is_sibling_of_store_file() {
        let engine = FileEngine::new("/home/user/.cache/feed.store");
        assert_eq!(
            PathBuf::from("/home/user/.cache/feed.store.tmp"),
            engine.tmp_path()
        );
    }

    #[test]
    fn test_from_config_requires_location() {
        let err = FileEngine::from_config(&ConfigMock { location: None })
            .err()
            .unwrap();
        match err.downcast_ref::<FeedStoreError>() {
            Some(FeedStoreError::ConfigurationError(_)) => {}
            _ => panic!("Expected ConfigurationError"),
        }
        let engine = FileEngine::from_config(&ConfigMock {
            location: Some("/tmp/feed.store"),
        })
        .unwrap();
        assert_eq!(Path::new("/tmp/feed.store"), engine.path());
    }

    #[test]
    fn test_get_store_data() {
        let engine = FileEngine::new("/tmp/unused");
        let record = record();
        let data = encoded(&engine, &record);
        let read = engine
            .read_store_data(std::io::Cursor::new(data))
            .unwrap();
        assert_eq!(record, read);
    }

    #[test]
    fn test_get_store_data_checksum_mismatch_is_corrupt() {
        let engine = FileEngine::new("/tmp/unused");
        let data = gzip(&format!(
            "{STORE_FILE_HEADER}\n{}\n{{\"timestamp\":\"2020-09-13T12:26:40Z\",\"feed\":[]}}",
            "0".repeat(64)
        ));
        let err = engine
            .read_store_data(std::io::Cursor::new(data))
            .unwrap_err();
        assert_eq!(
            Some(&FeedStoreError::CorruptStoreFile("Checksum mismatch".to_string())),
            err.downcast_ref::<FeedStoreError>()
        );
    }

    #[test]
    fn test_get_store_data_unknown_header_is_corrupt() {
        let engine = FileEngine::new("/tmp/unused");
        let data = gzip("feedstore-v0\nabc\n{}");
        let err = engine
            .read_store_data(std::io::Cursor::new(data))
            .unwrap_err();
        match err.downcast_ref::<FeedStoreError>() {
            Some(FeedStoreError::CorruptStoreFile(msg)) => assert!(msg.contains("feedstore-v0")),
            _ => panic!("Expected CorruptStoreFile"),
        }
    }

    #[test]
    fn test_get_store_data_bad_payload_is_corrupt() {
        let engine = FileEngine::new("/tmp/unused");
        let payload = "{\"timestamp\":42}";
        let data = gzip(&format!(
            "{STORE_FILE_HEADER}\n{}\n{payload}",
            payload_checksum(payload.as_bytes())
        ));
        let err = engine
            .read_store_data(std::io::Cursor::new(data))
            .unwrap_err();
        match err.downcast_ref::<FeedStoreError>() {
            Some(FeedStoreError::CorruptStoreFile(_)) => {}
            _ => panic!("Expected CorruptStoreFile"),
        }
    }

    #[test]
    fn test_get_store_data_not_gzip_is_err() {
        let engine = FileEngine::new("/tmp/unused");
        let data = b"plain text, not compressed".to_vec();
        assert!(engine.read_store_data(std::io::Cursor::new(data)).is_err());
    }

    #[test]
    fn test_delete_feed_items_keeps_cache_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = FileEngine::new(dir.path().join("feed.store"));
        let record = record();
        engine.insert(record.clone());
        engine.save().unwrap();

        engine.delete_all(EntityKind::FeedItem).unwrap();

        let fetched = engine.fetch().unwrap().unwrap();
        assert!(fetched.feed.is_empty());
        assert_eq!(record.timestamp, fetched.timestamp);
        assert!(!engine.tmp_path().exists());
    }

    #[test]
    fn test_delete_feed_items_on_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = FileEngine::new(dir.path().join("feed.store"));
        engine.delete_all(EntityKind::FeedItem).unwrap();
        assert!(engine.fetch().unwrap().is_none());
        assert!(!engine.path().exists());
    }

    #[test]
    fn test_payload_checksum() {
        assert_eq!(
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            payload_checksum(b"")
        );
    }

    #[test]
    fn test_compression_levels_read_back() {
        for compression in [Compression::fast(), Compression::best()] {
            let engine = FileEngine::new("/tmp/unused").with_compression(compression);
            let record = record();
            let data = encoded(&engine, &record);
            assert_eq!(
                record,
                engine.read_store_data(std::io::Cursor::new(data)).unwrap()
            );
        }
    }
}
