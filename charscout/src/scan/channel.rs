use std::io::{self, ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};

/// Width of the single message carried by a result channel
pub const MESSAGE_LEN: usize = std::mem::size_of::<i64>();

/// Creates a one-shot channel for a single worker result.
///
/// The sending half goes to the worker, the receiving half stays with the controller.
/// Dropping the sender without sending closes the channel.
pub fn result_channel() -> io::Result<(ResultSender, ResultReceiver)> {
    let (writer, reader) = UnixStream::pair()?;
    writer.shutdown(std::net::Shutdown::Read)?;
    reader.shutdown(std::net::Shutdown::Write)?;
    Ok((ResultSender { stream: writer }, ResultReceiver::new(reader)))
}

/// Writing end of a result channel, owned by exactly one worker
#[derive(Debug)]
pub struct ResultSender {
    stream: UnixStream,
}

impl ResultSender {
    /// Sends the worker's count and closes the channel
    pub fn send(mut self, value: i64) -> io::Result<()> {
        self.stream.write_all(&value.to_ne_bytes())?;
        self.stream.flush()
    }
}

/// A byte source whose reads can be bounded by an absolute deadline
pub trait DeadlineRead {
    /// Reads into `buf`, failing with `TimedOut` or `WouldBlock` once `deadline` passes
    fn read_before(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<usize>;
}

impl DeadlineRead for UnixStream {
    fn read_before(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<usize> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::from(ErrorKind::TimedOut));
        }
        self.set_read_timeout(Some(remaining))?;
        self.read(buf)
    }
}

/// What the controller observed on a result channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A complete scalar arrived
    Value(i64),
    /// The channel closed after `received` bytes, short of a full scalar
    Closed { received: usize },
    /// Nothing complete arrived before the deadline
    TimedOut,
}

/// Reading end of a result channel, owned by the controller
#[derive(Debug)]
pub struct ResultReceiver<R = UnixStream> {
    source: R,
}

impl<R: DeadlineRead> ResultReceiver<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Waits up to `timeout` for the worker's scalar.
    ///
    /// Consumes the receiver, so the endpoint is released on every outcome. Short reads
    /// are accumulated until the full scalar is assembled; interrupted reads resume
    /// against the original deadline.
    pub fn receive(mut self, timeout: Duration) -> io::Result<Delivery> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; MESSAGE_LEN];
        let mut filled = 0;

        while filled < MESSAGE_LEN {
            match self.source.read_before(&mut buf[filled..], deadline) {
                Ok(0) => return Ok(Delivery::Closed { received: filled }),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(Delivery::TimedOut)
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Delivery::Value(i64::from_ne_bytes(buf)))
    }
}
