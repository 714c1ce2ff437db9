//! The byte pipe a connection runs over.
//!
//! Opening and configuring the physical link is the caller's business; a
//! connection only polls, reads and writes.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// An ordered, unreliable byte transport.
pub trait ByteTransport {
    /// Bytes that can be read right now without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// One read attempt into `buf`; returns how many bytes were read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl<T: ByteTransport + ?Sized> ByteTransport for Box<T> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write(bytes)
    }
}

type Pipe = Arc<Mutex<VecDeque<u8>>>;

fn lock(pipe: &Pipe) -> MutexGuard<'_, VecDeque<u8>> {
    pipe.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One end of an in-memory duplex pipe. Ends may live on different threads.
pub struct MemPort {
    rx: Pipe,
    tx: Pipe,
}

/// Two connected ends: bytes written to one are read from the other.
#[must_use]
pub fn duplex() -> (MemPort, MemPort) {
    let a: Pipe = Arc::new(Mutex::new(VecDeque::new()));
    let b: Pipe = Arc::new(Mutex::new(VecDeque::new()));
    let left = MemPort {
        rx: Arc::clone(&a),
        tx: Arc::clone(&b),
    };
    let right = MemPort { rx: b, tx: a };
    (left, right)
}

impl ByteTransport for MemPort {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(lock(&self.rx).len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut rx = lock(&self.rx);
        let n = usize::min(buf.len(), rx.len());
        for (dst, src) in buf.iter_mut().zip(rx.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        lock(&self.tx).extend(bytes);
        Ok(())
    }
}

/// Runs every outgoing write through `fault` before it reaches the inner
/// transport. `fault` may flip, truncate or clear the bytes.
pub struct FaultyPort<T> {
    inner: T,
    fault: Box<dyn FnMut(&mut Vec<u8>) + Send>,
}

impl<T> FaultyPort<T> {
    pub fn new(inner: T, fault: impl FnMut(&mut Vec<u8>) + Send + 'static) -> Self {
        FaultyPort {
            inner,
            fault: Box::new(fault),
        }
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: ByteTransport> ByteTransport for FaultyPort<T> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        self.inner.bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut bytes = bytes.to_vec();
        (self.fault)(&mut bytes);
        if bytes.is_empty() {
            return Ok(());
        }
        self.inner.write(&bytes)
    }
}
