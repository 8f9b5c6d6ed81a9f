//! Single-writer, single-reader byte channel between segment delivery and parsing.
//!
//! The dispatch loop appends each reassembled segment with [`PipeWriter::put_bytes`];
//! the stream worker pulls whatever has accumulated with [`PipeReader::read`], waiting
//! for a wake-up when the pipe is empty. A pipe can be discarded in place when the
//! worker has to resynchronize, and it can bound how long a read waits with a deadline.
//!
//! Closing is idempotent from either end. The backing buffer comes from the session's
//! [`BufferPool`] and goes back exactly once: on close if it is empty, otherwise once
//! the reader has drained the rest, or when both ends are dropped. Discarding a pipe whose
//! buffer has grown hands that buffer back early and continues with a fresh one.

use std::future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::pool::{BufferPool, DEFAULT_BUFFER_SIZE};
use crate::protocol::PipeError;

/// How long a writer waits for the reader to take a pending wake-up.
pub const PUT_GRACE: Duration = Duration::from_millis(100);

/// A discarded buffer above this capacity goes back to the pool and is replaced.
const KEEP_ON_DISCARD: usize = 4 * 1024;

/// Creates a connected pipe whose buffer is taken from `pool`.
pub fn pipe(pool: Arc<BufferPool>) -> (PipeWriter, PipeReader) {
    let (notify_tx, notify_rx) = mpsc::channel(1);
    let shared = Arc::new(Shared {
        buf: Mutex::new(pool.get(DEFAULT_BUFFER_SIZE)),
        closed: AtomicBool::new(false),
        abnormal: AtomicBool::new(false),
        released: AtomicBool::new(false),
        close_token: CancellationToken::new(),
        pool,
    });

    let writer = PipeWriter { shared: Arc::clone(&shared), notify: notify_tx };
    let reader = PipeReader { shared, notify: notify_rx, deadline: None };
    (writer, reader)
}

#[derive(Debug)]
struct Shared {
    buf: Mutex<BytesMut>,
    closed: AtomicBool,
    abnormal: AtomicBool,
    released: AtomicBool,
    close_token: CancellationToken,
    pool: Arc<BufferPool>,
}

impl Shared {
    // never held across an await
    fn lock_buf(&self) -> MutexGuard<'_, BytesMut> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        if self.closed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return;
        }
        self.close_token.cancel();

        let empty = self.lock_buf().is_empty();
        if empty {
            self.release();
        }
        trace!(empty, "pipe closed");
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let buf = std::mem::take(&mut *self.lock_buf());
        self.pool.put(buf);
    }

    fn drain_into(&self, dst: &mut BytesMut) -> usize {
        let mut buf = self.lock_buf();
        let n = buf.len();
        if n > 0 {
            dst.extend_from_slice(&buf);
            buf.clear();
        }
        n
    }

    fn discard(&self) {
        let mut buf = self.lock_buf();
        if buf.capacity() > KEEP_ON_DISCARD {
            let grown = std::mem::replace(&mut *buf, self.pool.get(DEFAULT_BUFFER_SIZE));
            drop(buf);
            self.pool.put(grown);
        } else {
            buf.clear();
        }
        self.abnormal.store(false, Ordering::Release);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.release();
    }
}

/// Producer end of a pipe, held by the dispatch loop.
#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<Shared>,
    notify: mpsc::Sender<()>,
}

impl PipeWriter {
    /// Appends `bytes` and wakes the reader.
    ///
    /// If a wake-up is already pending, waits at most [`PUT_GRACE`] for the reader to
    /// take it and then returns anyway; the bytes are buffered either way.
    pub async fn put_bytes(&self, bytes: &[u8]) -> Result<(), PipeError> {
        if self.shared.is_closed() {
            return Err(PipeError::Closed);
        }
        self.shared.lock_buf().extend_from_slice(bytes);

        match self.notify.try_send(()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(())) => Err(PipeError::Closed),
            Err(TrySendError::Full(())) => {
                tokio::select! {
                    result = self.notify.send(()) => result.map_err(|_closed| PipeError::Closed),
                    () = self.shared.close_token.cancelled() => Err(PipeError::Closed),
                    () = sleep(PUT_GRACE) => Ok(()),
                }
            }
        }
    }

    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn discard(&self) {
        self.shared.discard();
    }

    pub fn mark_abnormal(&self) {
        self.shared.abnormal.store(true, Ordering::Release);
    }

    pub fn is_abnormal(&self) -> bool {
        self.shared.abnormal.load(Ordering::Acquire)
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Consumer end of a pipe, held by a stream worker.
#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<Shared>,
    notify: mpsc::Receiver<()>,
    deadline: Option<Instant>,
}

impl PipeReader {
    /// Moves every buffered byte into `dst` and returns how many were moved.
    ///
    /// Waits while the pipe is empty. Fails with [`PipeError::Closed`] once the pipe is
    /// closed and fully drained, and with [`PipeError::DeadlineExceeded`] when the read
    /// deadline passes twice without any bytes arriving.
    pub async fn read(&mut self, dst: &mut BytesMut) -> Result<usize, PipeError> {
        let mut deadline_hit = false;

        loop {
            if self.shared.is_closed() {
                let n = self.shared.drain_into(dst);
                self.shared.release();
                return if n == 0 { Err(PipeError::Closed) } else { Ok(n) };
            }

            let n = self.shared.drain_into(dst);
            if n > 0 {
                return Ok(n);
            }

            tokio::select! {
                biased;

                () = self.shared.close_token.cancelled() => {}
                notified = self.notify.recv() => {
                    if notified.is_none() {
                        self.shared.close();
                    }
                }
                () = expired(self.deadline) => {
                    if deadline_hit {
                        return Err(PipeError::DeadlineExceeded);
                    }
                    deadline_hit = true;
                }
            }
        }
    }

    /// Bounds subsequent blocking reads; `None` waits forever.
    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn discard(&self) {
        self.shared.discard();
    }

    pub fn mark_abnormal(&self) {
        self.shared.abnormal.store(true, Ordering::Release);
    }

    pub fn is_abnormal(&self) -> bool {
        self.shared.abnormal.load(Ordering::Acquire)
    }
}

async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
