//! Durable audit queue.
//!
//! At-least-once: a received batch stays in flight until acknowledged, and an
//! unacknowledged batch is handed out again on the next receive. Only one
//! batch is in flight per queue.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::anyhow;
use chron_core::message::QueueMessage;
use serde_jsonlines::JsonLinesReader;

use crate::error::QueueError;
use crate::lockfile;

/// A batch handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub messages: Vec<QueueMessage>,
    /// Lines that could not be decoded. They are dropped with the batch.
    pub dropped: usize,
    /// Whether this batch was already handed out and never acknowledged.
    pub redelivered: bool,
}

/// The queue seam between dispatch and the worker.
pub trait AuditQueue: Send + Sync {
    fn name(&self) -> &str;

    fn enqueue(&self, message: &QueueMessage) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Take the next batch, or `None` when nothing is pending or in flight.
    fn receive(&self) -> impl Future<Output = Result<Option<Delivery>, QueueError>> + Send;

    /// Acknowledge the in-flight batch.
    fn ack(&self, delivery: &Delivery) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Messages waiting or in flight.
    fn pending(&self) -> impl Future<Output = Result<usize, QueueError>> + Send;
}

/// Byte range of the log handed out as one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: u64,
    end: u64,
}

/// File-backed queue shared by producer and worker processes.
///
/// Messages are appended to `{dir}/{name}.jsonl` and never moved. The
/// consumer keeps its committed byte offset in `{name}.cursor` and the
/// span of the batch in flight in `{name}.inflight`. Acknowledging commits
/// the span end, so lines appended while a batch is in flight stay queued.
/// Every operation holds `{name}.lock`, and the log is truncated only when
/// acknowledging a batch that reached its end.
#[derive(Debug)]
pub struct JsonlQueue {
    name: String,
    dir: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonlQueue {
    /// Open the queue, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self, QueueError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            name: name.into(),
            dir,
            lock: tokio::sync::Mutex::new(()),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(format!("{}.jsonl", self.name))
    }

    #[must_use]
    pub fn cursor_path(&self) -> PathBuf {
        self.dir.join(format!("{}.cursor", self.name))
    }

    #[must_use]
    pub fn inflight_path(&self) -> PathBuf {
        self.dir.join(format!("{}.inflight", self.name))
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(format!("{}.lock", self.name))
    }

    /// Every decodable message not yet acknowledged, without taking them.
    ///
    /// # Errors
    ///
    /// Returns `QueueError` if the queue files cannot be read or locked.
    pub async fn peek(&self) -> Result<Vec<QueueMessage>, QueueError> {
        let _guard = self.lock.lock().await;
        let _file_lock = lockfile::acquire(&self.lock_path()).await?;
        let start = self.unacked_start()?;
        let (bytes, _) = read_complete_lines(&self.log_path(), start)?;
        Ok(decode_lines(&self.log_path(), &bytes).0)
    }

    /// Offset of the oldest unacknowledged byte.
    fn unacked_start(&self) -> Result<u64, QueueError> {
        let len = file_len(&self.log_path())?;
        match self.read_inflight()? {
            Some(span) if span.end <= len => Ok(span.start),
            _ => Ok(self.read_cursor()?.min(len)),
        }
    }

    fn read_cursor(&self) -> Result<u64, QueueError> {
        let Some(text) = read_optional(&self.cursor_path())? else {
            return Ok(0);
        };
        text.trim()
            .parse()
            .map_err(|e| QueueError::Other(anyhow!("corrupt queue cursor {text:?}: {e}")))
    }

    fn write_cursor(&self, offset: u64) -> Result<(), QueueError> {
        write_replacing(&self.cursor_path(), &offset.to_string())
    }

    fn read_inflight(&self) -> Result<Option<Span>, QueueError> {
        let Some(text) = read_optional(&self.inflight_path())? else {
            return Ok(None);
        };
        let mut parts = text.split_whitespace().map(str::parse::<u64>);
        match (parts.next(), parts.next()) {
            (Some(Ok(start)), Some(Ok(end))) if start <= end => Ok(Some(Span { start, end })),
            _ => Err(QueueError::Other(anyhow!("corrupt in-flight marker {text:?}"))),
        }
    }

    fn write_inflight(&self, span: Span) -> Result<(), QueueError> {
        write_replacing(&self.inflight_path(), &format!("{} {}", span.start, span.end))
    }

    fn clear_inflight(&self) -> Result<(), QueueError> {
        remove_if_exists(&self.inflight_path())
    }
}

impl AuditQueue for JsonlQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let _guard = self.lock.lock().await;
        let _file_lock = lockfile::acquire(&self.lock_path()).await?;
        serde_jsonlines::append_json_lines(self.log_path(), [message])?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let _guard = self.lock.lock().await;
        let _file_lock = lockfile::acquire(&self.lock_path()).await?;
        let log = self.log_path();
        let len = file_len(&log)?;

        if let Some(span) = self.read_inflight()? {
            if span.end <= len {
                let (bytes, _) = read_complete_lines(&log, span.start)?;
                let taken = usize::try_from(span.end - span.start)
                    .map_err(|e| QueueError::Other(anyhow!(e)))?;
                let (messages, dropped) = decode_lines(&log, &bytes[..taken.min(bytes.len())]);
                tracing::warn!(
                    queue = %self.name,
                    messages = messages.len(),
                    "redelivering unacknowledged batch"
                );
                return Ok(Some(Delivery {
                    messages,
                    dropped,
                    redelivered: true,
                }));
            }
            // The log was compacted after this span was committed.
            tracing::warn!(queue = %self.name, "discarding in-flight marker past end of log");
            self.clear_inflight()?;
        }

        let mut start = self.read_cursor()?;
        if start > len {
            tracing::warn!(
                queue = %self.name,
                cursor = start,
                len,
                "queue cursor past end of log, rewinding"
            );
            start = 0;
        }
        let (bytes, end) = read_complete_lines(&log, start)?;
        if end == start {
            return Ok(None);
        }
        self.write_inflight(Span { start, end })?;
        let (messages, dropped) = decode_lines(&log, &bytes);
        Ok(Some(Delivery {
            messages,
            dropped,
            redelivered: false,
        }))
    }

    async fn ack(&self, _delivery: &Delivery) -> Result<(), QueueError> {
        let _guard = self.lock.lock().await;
        let _file_lock = lockfile::acquire(&self.lock_path()).await?;
        let Some(span) = self.read_inflight()? else {
            return Ok(());
        };
        let log = self.log_path();
        if span.end >= file_len(&log)? {
            // Cursor first: a crash before the truncate only redelivers.
            self.write_cursor(0)?;
            truncate(&log)?;
        } else {
            self.write_cursor(span.end)?;
        }
        self.clear_inflight()
    }

    async fn pending(&self) -> Result<usize, QueueError> {
        let _guard = self.lock.lock().await;
        let _file_lock = lockfile::acquire(&self.lock_path()).await?;
        let start = self.unacked_start()?;
        let (bytes, _) = read_complete_lines(&self.log_path(), start)?;
        Ok(bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.trim_ascii().is_empty())
            .count())
    }
}

/// Bytes of `path` from `start` through the last newline, and the offset
/// just past that newline. A trailing partial line is left for later.
fn read_complete_lines(path: &Path, start: u64) -> Result<(Vec<u8>, u64), QueueError> {
    let mut file = match OpenOptions::new().read(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok((Vec::new(), start)),
        Err(e) => return Err(e.into()),
    };
    file.seek(SeekFrom::Start(start))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let complete = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
    bytes.truncate(complete);
    Ok((bytes, start + complete as u64))
}

/// Decode queue lines. Undecodable lines are logged and counted.
fn decode_lines(path: &Path, bytes: &[u8]) -> (Vec<QueueMessage>, usize) {
    let mut messages = Vec::new();
    let mut dropped = 0;
    for line in JsonLinesReader::new(bytes).read_all::<QueueMessage>() {
        match line {
            Ok(message) => messages.push(message),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "dropping undecodable queue line");
                dropped += 1;
            }
        }
    }
    (messages, dropped)
}

fn file_len(path: &Path) -> Result<u64, QueueError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, QueueError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write through a temporary file so readers never see a partial value.
fn write_replacing(path: &Path, contents: &str) -> Result<(), QueueError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn truncate(path: &Path) -> Result<(), QueueError> {
    match OpenOptions::new().write(true).open(path) {
        Ok(file) => Ok(file.set_len(0)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn remove_if_exists(path: &Path) -> Result<(), QueueError> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    pending: VecDeque<QueueMessage>,
    inflight: Option<Vec<QueueMessage>>,
}

/// In-process queue with the same delivery semantics as [`JsonlQueue`].
#[derive(Debug)]
pub struct MemoryQueue {
    name: String,
    state: Mutex<MemoryState>,
}

impl MemoryQueue {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> Result<T, QueueError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| QueueError::Other(anyhow!("queue state lock poisoned")))?;
        Ok(f(&mut state))
    }
}

impl AuditQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.with_state(|state| state.pending.push_back(message.clone()))
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        self.with_state(|state| {
            if let Some(ref batch) = state.inflight {
                return Some(Delivery {
                    messages: batch.clone(),
                    dropped: 0,
                    redelivered: true,
                });
            }
            if state.pending.is_empty() {
                return None;
            }
            let batch: Vec<QueueMessage> = state.pending.drain(..).collect();
            state.inflight = Some(batch.clone());
            Some(Delivery {
                messages: batch,
                dropped: 0,
                redelivered: false,
            })
        })
    }

    async fn ack(&self, _delivery: &Delivery) -> Result<(), QueueError> {
        self.with_state(|state| state.inflight = None)
    }

    async fn pending(&self) -> Result<usize, QueueError> {
        self.with_state(|state| state.pending.len() + state.inflight.as_ref().map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chron_core::actor::ActorStamp;
    use chron_core::bucket::TemporalBucket;
    use chron_core::enums::AuditAction;
    use chron_core::keys::EntityKey;
    use chron_core::message::{AuditPayload, MESSAGE_VERSION};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::TempDir;

    fn message(id: i64) -> QueueMessage {
        QueueMessage {
            v: MESSAGE_VERSION,
            queue: "chronicle_audits".into(),
            payload: AuditPayload {
                auditable_type: "User".into(),
                auditable_id: Some(EntityKey::Int(id)),
                action: AuditAction::Update,
                audited_changes: chron_core::Row::new(),
                associated_type: None,
                associated_ids: Vec::new(),
                comment: None,
                actor: ActorStamp::anonymous(),
                extra: chron_core::Row::new(),
            },
            temporal_bucket: TemporalBucket::new("26"),
            locale: "en".into(),
            enqueued_at: Utc::now(),
        }
    }

    fn ids(delivery: &Delivery) -> Vec<Option<EntityKey>> {
        delivery
            .messages
            .iter()
            .map(|m| m.payload.auditable_id.clone())
            .collect()
    }

    #[tokio::test]
    async fn jsonl_batch_stays_in_flight_until_acked() {
        let dir = TempDir::new().unwrap();
        let queue = JsonlQueue::open(dir.path(), "chronicle_audits").unwrap();
        queue.enqueue(&message(1)).await.unwrap();
        queue.enqueue(&message(2)).await.unwrap();
        assert_eq!(queue.pending().await.unwrap(), 2);

        let delivery = queue.receive().await.unwrap().unwrap();
        assert_eq!(delivery.messages.len(), 2);
        assert!(!delivery.redelivered);
        assert!(queue.inflight_path().exists());
        assert!(!queue.lock_path().exists());

        queue.enqueue(&message(3)).await.unwrap();
        assert_eq!(queue.pending().await.unwrap(), 3);

        queue.ack(&delivery).await.unwrap();
        assert_eq!(queue.pending().await.unwrap(), 1);
        let next = queue.receive().await.unwrap().unwrap();
        assert_eq!(ids(&next), vec![Some(EntityKey::Int(3))]);
        queue.ack(&next).await.unwrap();
        assert!(queue.receive().await.unwrap().is_none());
        assert_eq!(std::fs::metadata(queue.log_path()).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn jsonl_unacked_batch_is_redelivered() {
        let dir = TempDir::new().unwrap();
        {
            let queue = JsonlQueue::open(dir.path(), "q").unwrap();
            queue.enqueue(&message(1)).await.unwrap();
            let first = queue.receive().await.unwrap().unwrap();
            assert!(!first.redelivered);
        }
        let reopened = JsonlQueue::open(dir.path(), "q").unwrap();
        reopened.enqueue(&message(2)).await.unwrap();
        let again = reopened.receive().await.unwrap().unwrap();
        assert!(again.redelivered);
        assert_eq!(ids(&again), vec![Some(EntityKey::Int(1))]);

        reopened.ack(&again).await.unwrap();
        let rest = reopened.receive().await.unwrap().unwrap();
        assert_eq!(ids(&rest), vec![Some(EntityKey::Int(2))]);
    }

    #[tokio::test]
    async fn append_during_in_flight_batch_survives_ack() {
        let dir = TempDir::new().unwrap();
        let queue = JsonlQueue::open(dir.path(), "q").unwrap();
        queue.enqueue(&message(1)).await.unwrap();

        // A producer in another process with the log already open.
        let mut producer = OpenOptions::new()
            .append(true)
            .open(queue.log_path())
            .unwrap();
        let delivery = queue.receive().await.unwrap().unwrap();
        assert_eq!(ids(&delivery), vec![Some(EntityKey::Int(1))]);

        let line = serde_json::to_string(&message(2)).unwrap();
        writeln!(producer, "{line}").unwrap();
        drop(producer);
        queue.ack(&delivery).await.unwrap();

        assert_eq!(queue.pending().await.unwrap(), 1);
        let next = queue.receive().await.unwrap().unwrap();
        assert!(!next.redelivered);
        assert_eq!(ids(&next), vec![Some(EntityKey::Int(2))]);
    }

    #[tokio::test]
    async fn jsonl_partial_line_waits_for_its_newline() {
        let dir = TempDir::new().unwrap();
        let queue = JsonlQueue::open(dir.path(), "q").unwrap();
        queue.enqueue(&message(1)).await.unwrap();
        let line = serde_json::to_string(&message(2)).unwrap();
        let (head, tail) = line.split_at(10);
        let mut producer = OpenOptions::new()
            .append(true)
            .open(queue.log_path())
            .unwrap();
        write!(producer, "{head}").unwrap();

        let first = queue.receive().await.unwrap().unwrap();
        assert_eq!(ids(&first), vec![Some(EntityKey::Int(1))]);
        assert_eq!(first.dropped, 0);
        queue.ack(&first).await.unwrap();
        assert!(queue.receive().await.unwrap().is_none());

        writeln!(producer, "{tail}").unwrap();
        let second = queue.receive().await.unwrap().unwrap();
        assert_eq!(ids(&second), vec![Some(EntityKey::Int(2))]);
    }

    #[tokio::test]
    async fn jsonl_bad_lines_are_dropped() {
        let dir = TempDir::new().unwrap();
        let queue = JsonlQueue::open(dir.path(), "q").unwrap();
        queue.enqueue(&message(1)).await.unwrap();
        let mut text = std::fs::read_to_string(queue.log_path()).unwrap();
        text.push_str("{\"not\":\"a message\"}\n");
        std::fs::write(queue.log_path(), text).unwrap();

        let delivery = queue.receive().await.unwrap().unwrap();
        assert_eq!(delivery.messages.len(), 1);
        assert_eq!(delivery.dropped, 1);
        assert_eq!(queue.peek().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn memory_queue_redelivers_until_acked() {
        let queue = MemoryQueue::new("q");
        assert!(queue.receive().await.unwrap().is_none());
        queue.enqueue(&message(1)).await.unwrap();

        let first = queue.receive().await.unwrap().unwrap();
        let second = queue.receive().await.unwrap().unwrap();
        assert!(second.redelivered);
        assert_eq!(first.messages, second.messages);

        queue.ack(&second).await.unwrap();
        assert_eq!(queue.pending().await.unwrap(), 0);
        assert!(queue.receive().await.unwrap().is_none());
    }
}
