//! Dedicated writer task owning the write half of a connection.
//!
//! Encoded frames are handed to the task over a bounded mpsc channel, so
//! callers never share the stream behind a lock and several ready frames
//! go out in one vectored write.
//!
//! ```text
//! request()  ─┐
//! send()     ─┼─► mpsc::Sender<Bytes> ─► writer task ─► stream
//! responses  ─┘
//! ```

use std::collections::VecDeque;
use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::{Buf, Bytes};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{RemoteError, Result};

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// Handle for queueing frames on the writer task.
///
/// Cheap to clone; the task stops once every handle is dropped.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
    pending: Arc<AtomicUsize>,
}

impl WriterHandle {
    /// Queue one encoded frame, waiting while the channel is full.
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.send(frame).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            RemoteError::ConnectionClosed
        })
    }

    /// Frames queued but not yet written.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether the writer task has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task over `writer`.
///
/// The returned join handle resolves with the first write error, or `Ok`
/// after all handles were dropped and the queue drained.
pub fn spawn_writer_task<W>(writer: W, capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending = Arc::new(AtomicUsize::new(0));
    let handle = WriterHandle {
        tx,
        pending: pending.clone(),
    };
    let task = tokio::spawn(writer_loop(rx, writer, pending));
    (handle, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<Bytes>, mut writer: W, pending: Arc<AtomicUsize>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut queue: VecDeque<Bytes> = VecDeque::with_capacity(MAX_BATCH_SIZE);
    while let Some(first) = rx.recv().await {
        queue.push_back(first);
        while queue.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => queue.push_back(frame),
                Err(_) => break,
            }
        }

        let frames = queue.len();
        if let Err(e) = flush_frames(&mut writer, &mut queue).await {
            tracing::error!(frames, error = %e, "Writer task failed");
            return Err(e);
        }
        pending.fetch_sub(frames, Ordering::Release);
    }
    let _ = writer.shutdown().await;
    Ok(())
}

/// Write every queued frame with vectored writes, then flush.
async fn flush_frames<W>(writer: &mut W, queue: &mut VecDeque<Bytes>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    consume(queue, 0);
    while !queue.is_empty() {
        let written = {
            let slices: Vec<IoSlice<'_>> = queue.iter().map(|frame| IoSlice::new(frame)).collect();
            writer.write_vectored(&slices).await?
        };
        if written == 0 {
            return Err(RemoteError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "stream accepted no bytes",
            )));
        }
        consume(queue, written);
    }
    writer.flush().await?;
    Ok(())
}

/// Drop `written` bytes from the front of the queue.
fn consume(queue: &mut VecDeque<Bytes>, mut written: usize) {
    while written > 0 {
        let Some(front) = queue.front_mut() else {
            break;
        };
        if front.len() <= written {
            written -= front.len();
            queue.pop_front();
        } else {
            front.advance(written);
            written = 0;
        }
    }
    while queue.front().is_some_and(|frame| frame.is_empty()) {
        queue.pop_front();
    }
}
