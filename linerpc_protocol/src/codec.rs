use std::io::{ErrorKind, Read, Write};
use std::marker::PhantomData;

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Call, Error, Reply, Result};

/// Default cap on a single buffered message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads JSON values one at a time off a continuous byte stream.
///
/// Bytes past the end of a decoded value stay buffered for the next call, so
/// a peer may pipeline several messages into one write or split one message
/// across many. Each buffered byte is scanned once and parsed once, however
/// finely the message is split.
pub struct Decoder<T> {
    buf: BytesMut,
    scan: Scan,
    max_size: usize,
    _marker: PhantomData<fn() -> T>,
}

pub type CallDecoder = Decoder<Call>;
pub type ReplyDecoder = Decoder<Reply>;

impl<T: DeserializeOwned> Decoder<T> {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Decoder {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scan: Scan::default(),
            max_size,
            _marker: PhantomData,
        }
    }

    /// Blocks until one complete value has been read.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between values. Any
    /// other failure leaves the stream position undefined and should end the
    /// connection.
    pub fn decode<R: Read + ?Sized>(&mut self, r: &mut R) -> Result<Option<T>> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(msg) = self.try_decode()? {
                return Ok(Some(msg));
            }

            if self.buf.len() >= self.max_size {
                return Err(Error::MessageTooLarge {
                    size: self.buf.len(),
                    max: self.max_size,
                });
            }

            let read = match r.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::Io(err)),
            };

            if read == 0 {
                if self.buf.iter().all(u8::is_ascii_whitespace) {
                    self.buf.clear();
                    self.scan = Scan::default();
                    return Ok(None);
                }
                return Err(Error::Decode(format!(
                    "stream closed inside a message ({} bytes pending)",
                    self.buf.len()
                )));
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn try_decode(&mut self) -> Result<Option<T>> {
        let end = match self.scan.advance(&self.buf)? {
            Some(end) => end,
            None => return Ok(None),
        };
        if end > self.max_size {
            return Err(Error::MessageTooLarge {
                size: end,
                max: self.max_size,
            });
        }
        let frame = self.buf.split_to(end);
        serde_json::from_slice(&frame)
            .map(Some)
            .map_err(|err| Error::Decode(err.to_string()))
    }
}

/// Finds where the next top-level object or array ends, resuming from the
/// last byte looked at. Envelopes are always objects, so any other top-level
/// value is rejected on its first byte.
#[derive(Debug, Default)]
struct Scan {
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Scan {
    /// Returns the length of the first complete value in `buf`, if there is
    /// one yet. Resets itself once a value has been found.
    fn advance(&mut self, buf: &[u8]) -> Result<Option<usize>> {
        while self.pos < buf.len() {
            let b = buf[self.pos];
            self.pos += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match b {
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        let end = self.pos;
                        *self = Scan::default();
                        return Ok(Some(end));
                    }
                }
                b'"' if self.depth > 0 => self.in_string = true,
                b' ' | b'\t' | b'\n' | b'\r' => {}
                _ if self.depth > 0 => {}
                _ => {
                    return Err(Error::Decode(format!(
                        "expected a JSON object, found byte {:#04x}",
                        b
                    )))
                }
            }
        }
        Ok(None)
    }
}

impl<T: DeserializeOwned> Default for Decoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes `msg` as one line of compact JSON. The caller flushes.
pub fn encode<T: Serialize, W: Write + ?Sized>(msg: &T, w: &mut W) -> Result<()> {
    let mut data = serde_json::to_vec(msg)?;
    data.push(b'\n');
    w.write_all(&data)?;
    Ok(())
}
