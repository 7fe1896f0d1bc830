//! Destinations for reassembled file bytes.
//!
//! The assembler opens one sink per transfer through a [`SinkFactory`],
//! writes every accepted block at its offset, and closes the sink once all
//! blocks have arrived. Blocks arrive in any order.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use log::debug;

/// A random-access destination for the bytes of one file.
pub trait BlockSink {
    /// What the sink yields once the transfer is complete.
    type Output;

    /// Writes `bytes` at `offset` from the start of the file.
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()>;

    /// Flushes and releases the sink.
    fn close(self) -> io::Result<Self::Output>;
}

/// Creates a sink when the first block of a new transfer is accepted.
pub trait SinkFactory {
    type Sink: BlockSink;

    /// Opens a sink for a file of `file_length` bytes.
    fn open(&mut self, file_length: usize) -> io::Result<Self::Sink>;
}

/// Collects the file in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySinkFactory;

impl SinkFactory for MemorySinkFactory {
    type Sink = MemorySink;

    fn open(&mut self, file_length: usize) -> io::Result<MemorySink> {
        Ok(MemorySink {
            bytes: vec![0; file_length],
        })
    }
}

/// An in-memory file of fixed length.
#[derive(Debug, Clone)]
pub struct MemorySink {
    bytes: Vec<u8>,
}

impl BlockSink for MemorySink {
    type Output = Vec<u8>;

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        let start = usize::try_from(offset).map_err(|_| out_of_range(offset))?;
        let end = start + bytes.len();
        if end > self.bytes.len() {
            return Err(out_of_range(offset));
        }
        self.bytes[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn close(self) -> io::Result<Vec<u8>> {
        Ok(self.bytes)
    }
}

fn out_of_range(offset: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("write at offset {offset} runs past the end of the file"),
    )
}

/// Moves the writes of another sink onto a background thread.
///
/// Writes are queued and return immediately. If the inner sink fails, the
/// worker stops and the error is returned by the next `write_at` or by
/// `close`, whichever comes first.
pub struct ThreadedSink<S: BlockSink> {
    sender: Option<Sender<(u64, Vec<u8>)>>,
    worker: Option<JoinHandle<io::Result<S::Output>>>,
}

impl<S> ThreadedSink<S>
where
    S: BlockSink + Send + 'static,
    S::Output: Send + 'static,
{
    /// Starts the worker thread that owns `sink`.
    pub fn spawn(sink: S) -> io::Result<Self> {
        let (sender, receiver) = unbounded::<(u64, Vec<u8>)>();

        let worker = thread::Builder::new()
            .name("pxit-sink".to_string())
            .spawn(move || {
                let mut sink = sink;
                for (offset, bytes) in receiver {
                    sink.write_at(offset, &bytes)?;
                }
                debug!("Sink worker drained, closing");
                sink.close()
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    fn join(&mut self) -> io::Result<S::Output> {
        drop(self.sender.take());
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| io::Error::other("sink worker panicked"))?,
            None => Err(io::Error::other("sink already closed")),
        }
    }
}

impl<S> BlockSink for ThreadedSink<S>
where
    S: BlockSink + Send + 'static,
    S::Output: Send + 'static,
{
    type Output = S::Output;

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        let Some(sender) = &self.sender else {
            return Err(io::Error::other("sink already closed"));
        };
        if sender.send((offset, bytes.to_vec())).is_ok() {
            return Ok(());
        }

        // The worker only hangs up after a failed write
        match self.join() {
            Err(e) => Err(e),
            Ok(_) => Err(io::Error::other("sink worker exited early")),
        }
    }

    fn close(mut self) -> io::Result<S::Output> {
        self.join()
    }
}

impl<S: BlockSink> Drop for ThreadedSink<S> {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl<S: BlockSink> std::fmt::Debug for ThreadedSink<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedSink")
            .field("open", &self.sender.is_some())
            .finish()
    }
}
