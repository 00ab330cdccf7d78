//! Per-connection TCP helpers.
//!
//! Each connection is polled with a short read timeout rather than a
//! blocking read, so the same task can promptly notice and flush a newly
//! queued outbound message without needing to split the stream into
//! independent read/write halves.

use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::TcpStream;
use compio::time::timeout;
use std::io;
use std::time::Duration;
use tfes_core::codec::encode;
use tfes_core::error::TfesError;
use tfes_core::message::Message;

/// Read buffer size for each poll.
pub const READ_BUF_SIZE: usize = 8192;

/// How long a single read poll waits for data before yielding back to the
/// caller to drain outbound writes.
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// The result of one timed read poll.
pub enum ReadOutcome {
    /// Bytes were read.
    Data(Vec<u8>),
    /// The peer closed the connection.
    Eof,
    /// No data arrived within [`READ_POLL_INTERVAL`]; not an error.
    TimedOut,
    /// A read error occurred.
    Err(io::Error),
}

/// Disables Nagle's algorithm on `stream`.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn enable_tcp_nodelay(stream: &TcpStream) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::{AsRawFd, FromRawFd};
        let fd = stream.as_raw_fd();
        // SAFETY: the socket2::Socket is forgotten before it could close the fd.
        let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
        sock.set_nodelay(true)?;
        std::mem::forget(sock);
        Ok(())
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::{AsRawSocket, FromRawSocket};
        let raw = stream.as_raw_socket();
        // SAFETY: the socket2::Socket is forgotten before it could close the socket.
        let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
        sock.set_nodelay(true)?;
        std::mem::forget(sock);
        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    {
        Ok(())
    }
}

/// Polls `stream` for up to [`READ_POLL_INTERVAL`] and returns what happened.
pub async fn poll_read(stream: &mut TcpStream) -> ReadOutcome {
    let buf = vec![0u8; READ_BUF_SIZE];
    match timeout(READ_POLL_INTERVAL, stream.read(buf)).await {
        Ok(BufResult(Ok(0), _)) => ReadOutcome::Eof,
        Ok(BufResult(Ok(n), buf)) => ReadOutcome::Data(buf[..n].to_vec()),
        Ok(BufResult(Err(e), _)) => ReadOutcome::Err(e),
        Err(_elapsed) => ReadOutcome::TimedOut,
    }
}

/// Encodes and writes one message to `stream`.
///
/// # Errors
///
/// Returns an error if encoding fails or the write does not complete.
pub async fn write_message(stream: &mut TcpStream, msg: &Message) -> Result<(), TfesError> {
    let frame = encode(msg)?;
    let BufResult(res, _) = stream.write_all(frame).await;
    res.map_err(TfesError::Io)
}
