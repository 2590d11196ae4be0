//! The implementation of the length-prefixed application layer framing.
//!
//! Every frame is a fixed width header holding the payload length as ASCII
//! decimal, left-justified and padded with spaces, followed by the payload.

use std::io::{self, Read, Write};

use log::debug;

use crate::error::FrameErr;

/// Default width of the frame header in bytes.
pub const DEFAULT_HEADER_LEN: usize = 10;

/// Upper bound on the payload buffer reserved before any byte arrives.
const INITIAL_PAYLOAD_CAPACITY: usize = 64 * 1024;

/// The outcome of waiting for a frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    /// A complete payload.
    Frame(Vec<u8>),
    /// The peer closed the stream cleanly between frames.
    EndOfStream,
}

/// Frames discrete messages over a blocking byte stream.
pub struct FramedChannel<S> {
    stream: S,
    header_len: usize,
    buf: Vec<u8>,
}

impl<S> FramedChannel<S> {
    /// Creates a new `FramedChannel` instance.
    ///
    /// # Arguments
    /// * `stream` - The underlying bidirectional stream.
    /// * `header_len` - The width of the length header, both peers must agree on it.
    pub fn new(stream: S, header_len: usize) -> Self {
        Self {
            stream,
            header_len,
            buf: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Gives back the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Renders the header for a payload of `len` bytes.
    fn header(&self, len: usize) -> Result<String, FrameErr> {
        let header = format!("{len:<width$}", width = self.header_len);

        if header.len() > self.header_len {
            return Err(FrameErr::PayloadTooLarge {
                len,
                header_len: self.header_len,
            });
        }

        Ok(header)
    }
}

impl<S: Write> FramedChannel<S> {
    /// Sends `payload` as a single frame.
    ///
    /// Header and payload go out in a single `write_all`.
    ///
    /// # Arguments
    /// * `payload` - The encoded message.
    ///
    /// # Errors
    /// `FrameErr::PayloadTooLarge` if the length does not fit in the header,
    /// `FrameErr::Io` if the stream fails.
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<(), FrameErr> {
        let header = self.header(payload.len())?;

        let Self { stream, buf, .. } = self;

        buf.clear();
        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(payload);

        stream.write_all(buf)?;
        stream.flush()?;

        debug!(len = payload.len(); "sent frame");
        Ok(())
    }
}

impl<S: Read> FramedChannel<S> {
    /// Blocks until a whole frame arrives or the peer closes the stream.
    ///
    /// # Returns
    /// `Received::Frame` with exactly the announced number of bytes, or
    /// `Received::EndOfStream` if the stream closed before any header byte.
    ///
    /// # Errors
    /// `FrameErr::MalformedHeader` if the header is not a number,
    /// `FrameErr::Truncated` if the stream closes mid-frame,
    /// `FrameErr::Io` if the stream fails.
    pub fn receive_frame(&mut self) -> Result<Received, FrameErr> {
        let mut header = vec![0; self.header_len];
        let filled = read_full(&mut self.stream, &mut header)?;

        if filled == 0 {
            return Ok(Received::EndOfStream);
        }

        if filled < self.header_len {
            return Err(FrameErr::Truncated {
                expected: self.header_len,
                received: filled,
            });
        }

        let len = parse_header(&header)?;

        // The buffer grows with the bytes actually read, never with the header's claim.
        let mut payload = Vec::with_capacity(len.min(INITIAL_PAYLOAD_CAPACITY));
        let filled = (&mut self.stream)
            .take(len as u64)
            .read_to_end(&mut payload)?;

        if filled < len {
            return Err(FrameErr::Truncated {
                expected: len,
                received: filled,
            });
        }

        debug!(len = len; "received frame");
        Ok(Received::Frame(payload))
    }
}

/// Reads until `buf` is full or the stream reaches EOF.
///
/// # Returns
/// The amount of bytes read, less than `buf.len()` only on EOF.
fn read_full<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}

fn parse_header(header: &[u8]) -> Result<usize, FrameErr> {
    let malformed = || FrameErr::MalformedHeader(String::from_utf8_lossy(header).into_owned());

    std::str::from_utf8(header)
        .map_err(|_| malformed())?
        .trim()
        .parse()
        .map_err(|_| malformed())
}
