//! Background tailing of the substrate's write-ahead log.

use crate::error::{StorageError, StorageResult};
use crate::store::{StoreInner, DEFAULT_KEYSPACE, INDEX_KEYSPACE_INFIX};
use crate::wal::batch::{decode_write_batch, RecordOp};
use crate::wal::{WalEvent, WalOp};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// How long the tailer sleeps when the log has no new records.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The WAL tailing task.
///
/// On start the tailer drains every historical log record from sequence
/// zero, then polls for new ones. Each record is decoded and dispatched
/// through the store's feed in sequence order. Stop is cooperative: the
/// task observes a flag and is joined.
pub(crate) struct WalTailer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WalTailer {
    /// Spawns the tailing thread.
    pub(crate) fn spawn(inner: Arc<StoreInner>) -> StorageResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("docdb-wal-tailer".to_string())
            .spawn(move || run(&inner, &flag))
            .map_err(|err| StorageError::io(format!("spawn WAL tailer: {err}")))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signals the task to stop and joins it.
    pub(crate) fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WalTailer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(inner: &StoreInner, stop: &AtomicBool) {
    debug!("WAL tailer started");
    // Sequence to resume reading from; 0 drains all history first.
    let mut since: u64 = 0;

    while !stop.load(Ordering::Relaxed) {
        let latest = inner.db.latest_sequence_number();
        if latest == 0 || latest < since {
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        match inner.db.get_updates_since(since) {
            Ok(updates) => {
                for item in updates {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    match item {
                        Ok((sequence, batch)) => {
                            let count = batch.len() as u64;
                            dispatch_batch(inner, sequence, batch.data());
                            since = sequence + count.max(1);
                        }
                        Err(err) => {
                            warn!(error = %err, "WAL iteration failed");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(since, error = %err, "WAL read failed");
            }
        }

        thread::sleep(POLL_INTERVAL);
    }
    debug!("WAL tailer stopped");
}

/// Decodes one batch and emits its records.
fn dispatch_batch(inner: &StoreInner, sequence: u64, data: &[u8]) {
    let decoded = match decode_write_batch(data) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(sequence, error = %err, "undecodable write batch");
            return;
        }
    };
    trace!(
        sequence = decoded.sequence,
        count = decoded.count,
        "decoded write batch"
    );

    for record in decoded.records {
        let Some(keyspace) = inner.keyspace_name(record.keyspace_id) else {
            trace!(
                keyspace_id = record.keyspace_id,
                "record for unknown keyspace suppressed"
            );
            continue;
        };
        // Index maintenance is internal churn; the default keyspace holds
        // only adapter metadata.
        if keyspace == DEFAULT_KEYSPACE || keyspace.contains(INDEX_KEYSPACE_INFIX) {
            continue;
        }

        let key = String::from_utf8_lossy(&record.key).into_owned();
        let event = match record.op {
            RecordOp::Put => WalEvent {
                op: WalOp::Put,
                keyspace,
                key,
                value: record
                    .value
                    .as_deref()
                    .map(render_document_json)
                    .unwrap_or_default(),
            },
            RecordOp::Delete => WalEvent {
                op: WalOp::Delete,
                keyspace,
                key,
                value: String::new(),
            },
        };
        inner.feed.emit(event);
    }
}

/// Renders the `data` field of a stored envelope as JSON, or empty when
/// the payload is not a document envelope.
fn render_document_json(bytes: &[u8]) -> String {
    match docdb_codec::decode_document(bytes) {
        Ok((_, data)) => docdb_codec::to_json_string(&data),
        Err(err) => {
            trace!(error = %err, "non-envelope value in document keyspace");
            String::new()
        }
    }
}
