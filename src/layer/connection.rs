use std::io;

use crate::{error::Result, transport::ByteTransport, utils::Seq16};

use super::{downloader, uploader, ConnectionState, Downloader, Uploader};

/// A reliable byte stream over one [`ByteTransport`].
///
/// Everything runs on the caller's thread: `send` blocks while it polls for
/// acknowledgments, `available` drains whatever frames have arrived, and
/// `read_byte` only consumes bytes that are already staged.
pub struct Connection<T> {
    transport: T,
    state: ConnectionState,
    uploader: Uploader,
    downloader: Downloader,
}

impl<T> Connection<T>
where
    T: ByteTransport,
{
    pub(super) fn new(
        transport: T,
        state: ConnectionState,
        uploader: Uploader,
        downloader: Downloader,
    ) -> Self {
        Connection {
            transport,
            state,
            uploader,
            downloader,
        }
    }

    /// Delivers `message` completely or fails as a whole.
    pub fn send(&mut self, message: &[u8]) -> Result<()> {
        self.uploader.send(
            message,
            &mut self.state,
            &mut self.downloader,
            &mut self.transport,
        )
    }

    pub fn send_str(&mut self, message: &str) -> Result<()> {
        self.send(message.as_bytes())
    }

    /// Handles every complete inbound frame, then reports whether bytes are
    /// waiting for [`Connection::read_byte`].
    pub fn available(&mut self) -> Result<bool> {
        while self
            .downloader
            .try_receive_one(&mut self.state, &mut self.transport)?
            .is_some()
        {}
        Ok(self.downloader.has_unread())
    }

    /// Next staged byte, or `None` when nothing is staged. Does no I/O.
    #[must_use]
    pub fn read_byte(&mut self) -> Option<u8> {
        self.downloader.read_byte()
    }

    #[must_use]
    pub fn stat(&self) -> Stat {
        Stat {
            upload: self.uploader.stat(&self.state),
            download: self.downloader.stat(),
        }
    }

    #[must_use]
    #[inline]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    #[must_use]
    #[inline]
    pub fn expected_seq(&self) -> Seq16 {
        self.downloader.expected_seq()
    }

    #[must_use]
    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[must_use]
    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl<T> io::Read for Connection<T>
where
    T: ByteTransport,
{
    /// `WouldBlock` when nothing is staged.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.available()?;
        match self.downloader.read(buf) {
            0 => Err(io::ErrorKind::WouldBlock.into()),
            n => Ok(n),
        }
    }
}

impl<T> io::Write for Connection<T>
where
    T: ByteTransport,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = usize::min(buf.len(), self.uploader.max_message_len());
        self.send(&buf[..len])?;
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Stat {
    pub upload: uploader::Stat,
    pub download: downloader::Stat,
}
