//! Date-partitioned append-only JSONL files
//!
//! ```text
//! <log_dir>/
//! ├── 2025-01-02.jsonl                 # active partition for that local date
//! ├── 2025-01-02.1735826400123.jsonl   # rotated aside when it grew too large
//! └── 2025-01-01.jsonl
//! ```
//!
//! Appends go to the partition named after the current local date. After each
//! append the file size is checked against the rotation threshold; an
//! oversized partition is renamed with an epoch-millisecond suffix and the
//! next append recreates the date-named file.
//!
//! Appends within one process are serialized by an async mutex that covers
//! both the write and the rotation check. Nothing coordinates separate
//! processes writing the same directory.

use crate::error::{ConvlogError, Result};
use crate::store::record::LogEntry;
use anyhow::Context;
use chrono::{Local, NaiveDate, Utc};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// File extension shared by active and rotated partitions
pub const PARTITION_EXTENSION: &str = ".jsonl";

/// Default rotation threshold (10 MiB)
pub const DEFAULT_ROTATION_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parsed identity of a partition file name
///
/// Orders most recent first: later dates before earlier ones, the active file
/// before its rotated siblings, newer rotations before older ones. Names that
/// do not parse sort after every well-formed partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionName {
    /// `YYYY-MM-DD.jsonl`
    Active(NaiveDate),
    /// `YYYY-MM-DD.<epoch_ms>.jsonl`
    Rotated(NaiveDate, u64),
    /// Any other `*.jsonl` file
    Other(String),
}

impl PartitionName {
    /// Parse a file name; returns `None` unless it ends in `.jsonl`
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(PARTITION_EXTENSION)?;
        let (date_part, rotation) = match stem.split_once('.') {
            Some((date, epoch)) => (date, Some(epoch)),
            None => (stem, None),
        };

        let parsed = NaiveDate::parse_from_str(date_part, DATE_FORMAT)
            .ok()
            .filter(|_| date_part.len() == 10);
        match (parsed, rotation) {
            (Some(date), None) => Some(PartitionName::Active(date)),
            (Some(date), Some(epoch)) => match epoch.parse::<u64>() {
                Ok(ms) if epoch.bytes().all(|b| b.is_ascii_digit()) => {
                    Some(PartitionName::Rotated(date, ms))
                }
                _ => Some(PartitionName::Other(file_name.to_string())),
            },
            (None, _) => Some(PartitionName::Other(file_name.to_string())),
        }
    }

    /// Calendar date the partition belongs to, if the name is well formed
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            PartitionName::Active(date) | PartitionName::Rotated(date, _) => Some(*date),
            PartitionName::Other(_) => None,
        }
    }

    fn recency_cmp(&self, other: &Self) -> Ordering {
        use PartitionName::*;
        match (self, other) {
            (Other(a), Other(b)) => b.cmp(a),
            (Other(_), _) => Ordering::Greater,
            (_, Other(_)) => Ordering::Less,
            _ => {
                let by_date = other.date().cmp(&self.date());
                by_date.then_with(|| match (self, other) {
                    (Active(_), Active(_)) => Ordering::Equal,
                    (Active(_), Rotated(..)) => Ordering::Less,
                    (Rotated(..), Active(_)) => Ordering::Greater,
                    (Rotated(_, a), Rotated(_, b)) => b.cmp(a),
                    _ => Ordering::Equal,
                })
            }
        }
    }
}

/// A partition file discovered in the log directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Full path to the file
    pub path: PathBuf,
    /// Parsed file name
    pub name: PartitionName,
}

/// Result of a successful append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Date-named partition the batch was appended to
    pub partition: PathBuf,
    /// Where that partition now lives if the append pushed it over the threshold
    pub rotated_to: Option<PathBuf>,
    /// Number of entries written
    pub entries_written: usize,
}

/// Append-only store over a directory of date-partitioned JSONL files
#[derive(Debug)]
pub struct PartitionStore {
    dir: PathBuf,
    rotation_threshold_bytes: u64,
    write_lock: Mutex<()>,
}

impl PartitionStore {
    /// Create a store rooted at `dir`
    ///
    /// The directory is created lazily on first append.
    pub fn new<P: Into<PathBuf>>(dir: P, rotation_threshold_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            rotation_threshold_bytes,
            write_lock: Mutex::new(()),
        }
    }

    /// Root directory of the partitions
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Size above which a partition is rotated aside
    pub fn rotation_threshold_bytes(&self) -> u64 {
        self.rotation_threshold_bytes
    }

    /// Path of the active partition for `date`
    pub fn partition_path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}{}", date.format(DATE_FORMAT), PARTITION_EXTENSION))
    }

    /// Path of the active partition for today's local date
    pub fn current_partition_path(&self) -> PathBuf {
        self.partition_path_for(Local::now().date_naive())
    }

    /// Append a batch of entries to today's partition
    ///
    /// The whole batch is serialized first and written with a single call, so
    /// the lines of one batch land contiguously. Rotation is checked after the
    /// write.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be created or the write
    /// fails. A failed append may have written part of the batch.
    pub async fn append(&self, entries: &[LogEntry]) -> Result<AppendOutcome> {
        let mut block = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut block, entry).map_err(ConvlogError::Serialization)?;
            block.push(b'\n');
        }

        let _guard = self.write_lock.lock().await;
        let partition = self.current_partition_path();

        if block.is_empty() {
            return Ok(AppendOutcome {
                partition,
                rotated_to: None,
                entries_written: 0,
            });
        }

        fs::create_dir_all(&self.dir)
            .await
            .map_err(ConvlogError::Io)
            .with_context(|| format!("Failed to create log directory {}", self.dir.display()))?;

        {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&partition)
                .await
                .map_err(ConvlogError::Io)
                .with_context(|| format!("Failed to open partition {}", partition.display()))?;
            file.write_all(&block)
                .await
                .map_err(ConvlogError::Io)
                .with_context(|| format!("Failed to append to {}", partition.display()))?;
            file.flush().await.map_err(ConvlogError::Io)?;
        }

        tracing::debug!(
            partition = %partition.display(),
            entries = entries.len(),
            bytes = block.len(),
            "Appended batch"
        );

        let rotated_to = self.rotate_if_oversized(&partition).await?;

        Ok(AppendOutcome {
            partition,
            rotated_to,
            entries_written: entries.len(),
        })
    }

    /// Rename `partition` aside if it is larger than the threshold
    ///
    /// The new name inserts the current epoch milliseconds before the
    /// extension: `2025-01-02.jsonl` becomes `2025-01-02.1735826400123.jsonl`.
    /// A missing file is not an error.
    pub async fn rotate_if_oversized(&self, partition: &Path) -> Result<Option<PathBuf>> {
        let size = match fs::metadata(partition).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConvlogError::Io(e))
                    .with_context(|| format!("Failed to stat {}", partition.display()))
            }
        };

        if size <= self.rotation_threshold_bytes {
            return Ok(None);
        }

        let stem = partition
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(PARTITION_EXTENSION))
            .ok_or_else(|| {
                ConvlogError::Validation(format!(
                    "Not a partition file: {}",
                    partition.display()
                ))
            })?;

        let mut epoch_ms = Utc::now().timestamp_millis().max(0) as u64;
        let mut target = self.rotated_path(stem, epoch_ms);
        while fs::try_exists(&target)
            .await
            .map_err(ConvlogError::Io)
            .with_context(|| format!("Failed to check rotation target {}", target.display()))?
        {
            epoch_ms += 1;
            target = self.rotated_path(stem, epoch_ms);
        }

        fs::rename(partition, &target)
            .await
            .map_err(ConvlogError::Io)
            .with_context(|| format!("Failed to rotate {}", partition.display()))?;

        tracing::info!(
            from = %partition.display(),
            to = %target.display(),
            size,
            threshold = self.rotation_threshold_bytes,
            "Rotated oversized partition"
        );

        Ok(Some(target))
    }

    fn rotated_path(&self, stem: &str, epoch_ms: u64) -> PathBuf {
        self.dir
            .join(format!("{}.{}{}", stem, epoch_ms, PARTITION_EXTENSION))
    }

    /// List every partition file, most recent first
    ///
    /// A missing log directory yields an empty list.
    pub async fn list_partitions(&self) -> Result<Vec<Partition>> {
        let mut read_dir = match fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ConvlogError::Io(e))
                    .with_context(|| format!("Failed to read {}", self.dir.display()))
            }
        };

        let mut partitions = Vec::new();
        while let Some(dir_entry) = read_dir.next_entry().await.map_err(ConvlogError::Io)? {
            let file_name = dir_entry.file_name();
            let Some(name) = file_name.to_str().and_then(PartitionName::parse) else {
                continue;
            };
            let is_file = dir_entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                partitions.push(Partition {
                    path: dir_entry.path(),
                    name,
                });
            }
        }

        partitions.sort_by(|a, b| a.name.recency_cmp(&b.name));
        Ok(partitions)
    }

    /// Open a partition for line-by-line reading
    ///
    /// Returns `None` if the file disappeared since it was listed.
    pub async fn open_reader(&self, partition: &Partition) -> Result<Option<PartitionReader>> {
        match fs::File::open(&partition.path).await {
            Ok(file) => Ok(Some(PartitionReader {
                path: partition.path.clone(),
                reader: BufReader::new(file),
                buf: Vec::new(),
                skipped: 0,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConvlogError::Io(e))
                .with_context(|| format!("Failed to open {}", partition.path.display())),
        }
    }
}

/// Streaming reader over the entries of one partition
///
/// Malformed lines are skipped and counted.
pub struct PartitionReader {
    path: PathBuf,
    reader: BufReader<fs::File>,
    buf: Vec<u8>,
    skipped: usize,
}

impl PartitionReader {
    /// Read the next well-formed entry, or `None` at end of file
    pub async fn next_entry(&mut self) -> Result<Option<LogEntry>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .await
                .map_err(ConvlogError::Io)
                .with_context(|| format!("Failed to read {}", self.path.display()))?;
            if read == 0 {
                return Ok(None);
            }

            let line = trim_line(&self.buf);
            if line.is_empty() {
                continue;
            }

            match serde_json::from_slice::<LogEntry>(line) {
                Ok(entry) => return Ok(Some(entry)),
                Err(e) => {
                    self.skipped += 1;
                    tracing::debug!(
                        partition = %self.path.display(),
                        error = %e,
                        "Skipping malformed log line"
                    );
                }
            }
        }
    }

    /// Number of malformed lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record::{Metadata, Role};
    use tempfile::TempDir;

    fn entry(session: &str, message: &str) -> LogEntry {
        LogEntry {
            timestamp: "2025-01-01T00:00:00.000Z".to_string(),
            session_id: session.to_string(),
            user_id: None,
            role: Role::User,
            message: message.to_string(),
            tokens: 1,
            latency_ms: None,
            model: None,
            metadata: Metadata::new(),
        }
    }

    async fn read_all(store: &PartitionStore, partition: &Partition) -> Vec<LogEntry> {
        let mut reader = store.open_reader(partition).await.unwrap().unwrap();
        let mut out = Vec::new();
        while let Some(e) = reader.next_entry().await.unwrap() {
            out.push(e);
        }
        out
    }

    #[test]
    fn test_parse_partition_names() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(
            PartitionName::parse("2025-01-02.jsonl"),
            Some(PartitionName::Active(d))
        );
        assert_eq!(
            PartitionName::parse("2025-01-02.1735826400123.jsonl"),
            Some(PartitionName::Rotated(d, 1735826400123))
        );
        assert_eq!(
            PartitionName::parse("notes.jsonl"),
            Some(PartitionName::Other("notes.jsonl".to_string()))
        );
        assert_eq!(
            PartitionName::parse("2025-01-02.old.jsonl"),
            Some(PartitionName::Other("2025-01-02.old.jsonl".to_string()))
        );
        assert_eq!(PartitionName::parse("2025-01-02.json"), None);
    }

    #[test]
    fn test_recency_order() {
        let mut names: Vec<PartitionName> = [
            "2025-01-01.jsonl",
            "2025-01-02.1000.jsonl",
            "misc.jsonl",
            "2025-01-02.jsonl",
            "2025-01-02.2000.jsonl",
            "2024-12-31.jsonl",
        ]
        .iter()
        .filter_map(|n| PartitionName::parse(n))
        .collect();
        names.sort_by(|a, b| a.recency_cmp(b));

        let d2 = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(names[0], PartitionName::Active(d2));
        assert_eq!(names[1], PartitionName::Rotated(d2, 2000));
        assert_eq!(names[2], PartitionName::Rotated(d2, 1000));
        assert_eq!(
            names[3],
            PartitionName::Active(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        );
        assert_eq!(
            names[4],
            PartitionName::Active(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
        );
        assert_eq!(names[5], PartitionName::Other("misc.jsonl".to_string()));
    }

    #[tokio::test]
    async fn test_append_creates_directory_and_file() {
        let temp = TempDir::new().unwrap();
        let store = PartitionStore::new(temp.path().join("nested/logs"), 1024 * 1024);

        let outcome = store.append(&[entry("s1", "hello")]).await.unwrap();

        assert_eq!(outcome.entries_written, 1);
        assert!(outcome.rotated_to.is_none());
        assert_eq!(outcome.partition, store.current_partition_path());
        let contents = std::fs::read_to_string(&outcome.partition).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_two_appends_concatenate_in_order() {
        let temp = TempDir::new().unwrap();
        let store = PartitionStore::new(temp.path(), 1024 * 1024);

        store
            .append(&[entry("s1", "one"), entry("s1", "two")])
            .await
            .unwrap();
        store.append(&[entry("s2", "three")]).await.unwrap();

        let partitions = store.list_partitions().await.unwrap();
        assert_eq!(partitions.len(), 1);
        let messages: Vec<String> = read_all(&store, &partitions[0])
            .await
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(messages, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_empty_append_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let store = PartitionStore::new(temp.path().join("logs"), 1024);
        let outcome = store.append(&[]).await.unwrap();
        assert_eq!(outcome.entries_written, 0);
        assert!(!outcome.partition.exists());
    }

    #[tokio::test]
    async fn test_oversized_partition_is_rotated_and_preserved() {
        let temp = TempDir::new().unwrap();
        let store = PartitionStore::new(temp.path(), 200);

        let outcome = store.append(&[entry("s1", &"long ".repeat(60))]).await.unwrap();
        let rotated = outcome.rotated_to.expect("partition should rotate");
        assert!(!outcome.partition.exists());
        let rotated_name = rotated.file_name().unwrap().to_str().unwrap().to_string();
        assert!(matches!(
            PartitionName::parse(&rotated_name),
            Some(PartitionName::Rotated(..))
        ));
        let before = std::fs::read(&rotated).unwrap();

        let next = store.append(&[entry("s1", "x")]).await.unwrap();
        assert!(next.rotated_to.is_none());
        assert!(outcome.partition.exists());
        assert_eq!(
            std::fs::read_to_string(&outcome.partition)
                .unwrap()
                .lines()
                .count(),
            1
        );
        assert_eq!(std::fs::read(&rotated).unwrap(), before);
    }

    #[tokio::test]
    async fn test_rotation_below_threshold_is_noop() {
        let temp = TempDir::new().unwrap();
        let store = PartitionStore::new(temp.path(), 1024 * 1024);
        let outcome = store.append(&[entry("s1", "small")]).await.unwrap();
        assert!(outcome.rotated_to.is_none());
        assert!(outcome.partition.exists());
    }

    #[tokio::test]
    async fn test_rotate_missing_file_is_noop() {
        let temp = TempDir::new().unwrap();
        let store = PartitionStore::new(temp.path(), 1);
        let result = store
            .rotate_if_oversized(&temp.path().join("2025-01-01.jsonl"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_rotation_avoids_existing_target() {
        let temp = TempDir::new().unwrap();
        let store = PartitionStore::new(temp.path(), 1);
        let first = temp.path().join("2025-01-01.jsonl");
        std::fs::write(&first, "aa\n").unwrap();
        let rotated_a = store.rotate_if_oversized(&first).await.unwrap().unwrap();
        std::fs::write(&first, "bb\n").unwrap();
        let rotated_b = store.rotate_if_oversized(&first).await.unwrap().unwrap();
        assert_ne!(rotated_a, rotated_b);
        assert_eq!(std::fs::read_to_string(rotated_a).unwrap(), "aa\n");
        assert_eq!(std::fs::read_to_string(rotated_b).unwrap(), "bb\n");
    }

    #[tokio::test]
    async fn test_rotation_target_check_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        // The store directory is a regular file, so checking a target inside it fails.
        let not_a_dir = temp.path().join("blocked");
        std::fs::write(&not_a_dir, "").unwrap();
        let store = PartitionStore::new(&not_a_dir, 1);

        let partition = temp.path().join("2025-01-01.jsonl");
        std::fs::write(&partition, "aa\n").unwrap();

        let err = store.rotate_if_oversized(&partition).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to check rotation target"));
        assert_eq!(crate::error::ErrorKind::of(&err), crate::error::ErrorKind::Io);
        assert_eq!(std::fs::read_to_string(&partition).unwrap(), "aa\n");
    }

    #[tokio::test]
    async fn test_list_partitions_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = PartitionStore::new(temp.path().join("absent"), 1024);
        assert!(store.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_partitions_ignores_other_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("2025-01-01.jsonl"), "").unwrap();
        std::fs::write(temp.path().join("2025-01-01.jsonl.bak"), "").unwrap();
        std::fs::write(temp.path().join("readme.txt"), "").unwrap();
        std::fs::create_dir(temp.path().join("dir.jsonl")).unwrap();

        let store = PartitionStore::new(temp.path(), 1024);
        let partitions = store.list_partitions().await.unwrap();
        assert_eq!(partitions.len(), 1);
        assert!(partitions[0].path.ends_with("2025-01-01.jsonl"));
    }

    #[tokio::test]
    async fn test_reader_skips_malformed_lines() {
        let temp = TempDir::new().unwrap();
        let good = serde_json::to_string(&entry("s1", "good")).unwrap();
        let mut contents = Vec::new();
        contents.extend_from_slice(good.as_bytes());
        contents.extend_from_slice(b"\n{not json}\n\n");
        contents.extend_from_slice(&[0xff, 0xfe, b'\n']);
        contents.extend_from_slice(good.as_bytes());
        contents.extend_from_slice(b"\r\n{\"truncated\":");
        std::fs::write(temp.path().join("2025-01-01.jsonl"), contents).unwrap();

        let store = PartitionStore::new(temp.path(), 1024);
        let partitions = store.list_partitions().await.unwrap();
        let mut reader = store.open_reader(&partitions[0]).await.unwrap().unwrap();
        let mut count = 0;
        while reader.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert_eq!(reader.skipped(), 3);
    }

    #[tokio::test]
    async fn test_open_reader_for_vanished_partition() {
        let temp = TempDir::new().unwrap();
        let store = PartitionStore::new(temp.path(), 1024);
        let partition = Partition {
            path: temp.path().join("2025-01-01.jsonl"),
            name: PartitionName::parse("2025-01-01.jsonl").unwrap(),
        };
        assert!(store.open_reader(&partition).await.unwrap().is_none());
    }
}
