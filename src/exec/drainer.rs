// src/exec/drainer.rs

//! Stream drainers: one OS thread per subprocess output stream.
//!
//! A drainer copies every line the process writes into an in-memory queue so
//! the OS pipe never fills up and the owner can poll output without blocking.
//! Once the owner sets the stop signal (after the process exited or was
//! killed), the worker reads whatever is left as one final chunk, closes the
//! stream and exits.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

pub struct StreamDrainer {
    name: String,
    queue: Receiver<String>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl StreamDrainer {
    /// Start draining `stream` on a dedicated worker thread.
    ///
    /// `name` shows up in logs and in the worker's thread name
    /// (e.g. `"stdout[4242]"`).
    pub fn start<R>(stream: R, name: impl Into<String>) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let name = name.into();
        let (tx, queue) = mpsc::channel::<String>();
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let stop = Arc::clone(&stop);
            let name = name.clone();
            thread::Builder::new()
                .name(format!("drain-{name}"))
                .spawn(move || drain_stream(stream, tx, stop, &name))?
        };

        Ok(Self {
            name,
            queue,
            stop,
            worker: Some(worker),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the worker to finish. It still reads everything up to EOF.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.worker.is_none()
    }

    /// Block until the worker exits. Calling it again is a no-op.
    pub fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(stream = %self.name, "drainer worker panicked");
            }
            debug!(stream = %self.name, "drainer joined");
        }
    }

    /// Everything queued so far, concatenated. Never blocks.
    pub fn try_drain(&self) -> String {
        let mut out = String::new();
        self.drain_into(&mut out);
        out
    }

    /// Append everything queued so far to `buf`; returns whether anything
    /// was appended.
    pub fn drain_into(&self, buf: &mut String) -> bool {
        let before = buf.len();
        loop {
            match self.queue.try_recv() {
                Ok(chunk) => buf.push_str(&chunk),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        buf.len() != before
    }

    /// Stop, join, and return whatever was still queued.
    pub fn finish(mut self) -> String {
        self.stop();
        self.join();
        self.try_drain()
    }
}

impl Drop for StreamDrainer {
    fn drop(&mut self) {
        self.stop();
        // Only join a worker that already hit EOF; a live pipe would block the
        // dropping thread. Owners join explicitly after killing the process.
        match self.worker.take() {
            Some(worker) if worker.is_finished() => {
                let _ = worker.join();
            }
            Some(_) => {
                warn!(stream = %self.name, "drainer dropped while its stream is still open");
            }
            None => {}
        }
    }
}

fn drain_stream<R: Read>(stream: R, tx: Sender<String>, stop: Arc<AtomicBool>, name: &str) {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    while !stop.load(Ordering::Acquire) {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(decode_chunk(&line, name)).is_err() {
                    debug!(stream = %name, "drainer queue closed; stopping");
                    return;
                }
            }
            Err(e) => {
                if !line.is_empty() {
                    let _ = tx.send(decode_chunk(&line, name));
                }
                warn!(stream = %name, error = %e, "error reading stream; stopping drainer");
                break;
            }
        }
    }

    let mut rest = Vec::new();
    if let Err(e) = reader.read_to_end(&mut rest) {
        warn!(stream = %name, error = %e, "error reading remaining stream bytes");
    }
    if !rest.is_empty() {
        trace!(stream = %name, bytes = rest.len(), "queueing remaining bytes");
        let _ = tx.send(decode_chunk(&rest, name));
    }
    debug!(stream = %name, "drainer finished");
    // `reader` drops here and closes the stream.
}

/// Decode as UTF-8, falling back to lossy UTF-8 with replacement characters.
fn decode_chunk(bytes: &[u8], name: &str) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => {
            trace!(stream = %name, line = ?s, "line");
            s.to_string()
        }
        Err(e) => {
            warn!(stream = %name, error = %e, raw = ?bytes, "undecodable output; substituting replacement characters");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
