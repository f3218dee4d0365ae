//! Log buffer
//!
//! Collects the output of a job's process. One ingestion task per output pipe
//! appends lines as they arrive, and any number of readers replay the
//! sequence from their own offsets, waiting only when they have caught up.
//!
//! The buffer keeps every line for the lifetime of the job.

use rexec_core::domain::job::JobId;
use rexec_core::domain::log::{LogEntry, LogSource};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Append-only, replayable store of a job's stdout and stderr lines
///
/// Lines from both pipes are interleaved in the order they were appended.
/// Readers block in [`LogBuffer::get`] until there is something new to read
/// or every feed has finished.
pub struct LogBuffer {
    job_id: JobId,
    state: Mutex<LogState>,
    /// Signalled on every append and whenever a feed finishes
    changed: Notify,
}

#[derive(Default)]
struct LogState {
    entries: Vec<LogEntry>,
    /// Feeds that may still append entries
    active_feeds: usize,
}

impl LogState {
    fn slice(&self, start: usize, max_count: usize) -> Vec<LogEntry> {
        let end = start.saturating_add(max_count).min(self.entries.len());
        self.entries
            .get(start..end)
            .map(<[LogEntry]>::to_vec)
            .unwrap_or_default()
    }
}

impl LogBuffer {
    /// Creates an empty buffer expecting `feeds` producers
    ///
    /// Every producer must eventually be attached with [`LogBuffer::attach`],
    /// otherwise readers past the tail wait forever.
    pub fn new(job_id: JobId, feeds: usize) -> Self {
        Self {
            job_id,
            state: Mutex::new(LogState {
                entries: Vec::new(),
                active_feeds: feeds,
            }),
            changed: Notify::new(),
        }
    }

    /// Creates a buffer fed by the stdout and stderr pipes of a process
    pub fn from_pipes<O, E>(job_id: JobId, stdout: O, stderr: E) -> Arc<Self>
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Self::new(job_id, 2));
        buffer.attach(stdout, LogSource::Stdout);
        buffer.attach(stderr, LogSource::Stderr);
        buffer
    }

    /// Spawns an ingestion task reading lines from `reader`
    ///
    /// The task ends when the reader reaches end of stream or fails, and
    /// marks its feed as finished either way.
    pub fn attach<R>(self: &Arc<Self>, reader: R, source: LogSource) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::clone(self);
        tokio::spawn(async move { buffer.ingest(reader, source).await })
    }

    async fn ingest<R>(&self, reader: R, source: LogSource)
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => {
                    debug!("Pipe {} of job {} got closed", source, self.job_id);
                    break;
                }
                Ok(_) => {
                    let text = decode_line(&line);
                    debug!("Job {} got log on {}: {}", self.job_id, source, text);
                    self.append(LogEntry::new(text, source));
                }
                Err(e) => {
                    // No retry for line capture: a broken pipe ends the feed.
                    warn!("Failed to read {} of job {}: {}", source, self.job_id, e);
                    break;
                }
            }
        }

        self.close_feed();
    }

    /// Adds an entry to the tail and wakes all waiting readers
    pub fn append(&self, entry: LogEntry) {
        self.state().entries.push(entry);
        self.changed.notify_waiters();
    }

    fn close_feed(&self) {
        {
            let mut state = self.state();
            state.active_feeds = state.active_feeds.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Returns up to `max_count` entries starting at index `start`
    ///
    /// Waits while `start` is past the tail and a feed is still active. An
    /// empty result means the output is exhausted: every feed has finished
    /// and there is nothing at `start`. Asking again returns empty again
    /// without waiting.
    pub async fn get(&self, start: usize, max_count: usize) -> Vec<LogEntry> {
        loop {
            // Register before inspecting the state so an append between the
            // check and the await is not missed.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.state();
                if start < state.entries.len() || state.active_feeds == 0 {
                    return state.slice(start, max_count);
                }
            }

            notified.await;
        }
    }

    /// Number of entries captured so far
    pub fn size(&self) -> usize {
        self.state().entries.len()
    }

    /// Whether every feed has finished
    pub fn is_complete(&self) -> bool {
        self.state().active_feeds == 0
    }

    fn state(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Strips the line terminator and decodes the rest, replacing invalid UTF-8
fn decode_line(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
