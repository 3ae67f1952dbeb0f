//! Incremental request framing.
//!
//! The decoder owns no socket. The connection loop appends whatever it read
//! to a buffer and calls [`RequestDecoder::decode`] until it yields `None`;
//! every complete request is removed from the front of the buffer, so bytes of
//! a following pipelined request stay where they are.

use log::debug;

use crate::parser::error::Error;
use crate::parser::request::{parse_request, HttpRequest};

/// Size limits applied while decoding requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderLimits {
    /// Longest accepted request line, without its line terminator.
    pub max_initial_line_length: usize,
    /// Longest accepted header section, line terminators included.
    pub max_header_size: usize,
    /// Number of bytes read from the socket per read call.
    pub max_chunk_size: usize,
    /// Largest body, fixed-length or chunked, aggregated into one request.
    pub max_content_length: usize,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            max_initial_line_length: 4096,
            max_header_size: 8192,
            max_chunk_size: 8192,
            max_content_length: 1024 * 1024,
        }
    }
}

#[derive(Debug)]
enum Body {
    Empty,
    Fixed { remaining: usize },
    Chunked(ChunkState),
}

#[derive(Debug, Clone, Copy)]
enum ChunkState {
    Size,
    Data { remaining: usize },
    DataEnd,
    Trailers,
}

/// Frames complete HTTP/1.x requests out of a byte buffer.
#[derive(Debug)]
pub struct RequestDecoder {
    limits: DecoderLimits,
    pending: Option<(HttpRequest, Body)>,
}

impl RequestDecoder {
    /// Create a decoder enforcing the given limits.
    pub fn new(limits: DecoderLimits) -> Self {
        Self {
            limits,
            pending: None,
        }
    }

    /// The limits this decoder enforces.
    pub fn limits(&self) -> &DecoderLimits {
        &self.limits
    }

    /// True when no request is partially decoded.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// Try to take one complete request off the front of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Consumed bytes are
    /// drained from `buf`; a partially received body is held inside the
    /// decoder between calls.
    pub fn decode(&mut self, buf: &mut Vec<u8>) -> Result<Option<HttpRequest>, Error> {
        if self.pending.is_none() {
            match self.decode_head(buf)? {
                Some(pending) => self.pending = Some(pending),
                None => return Ok(None),
            }
        }

        let Some((mut request, mut body)) = self.pending.take() else {
            return Ok(None);
        };

        let complete = match &mut body {
            Body::Empty => true,
            Body::Fixed { remaining } => {
                let n = (*remaining).min(buf.len());
                request.body.extend(buf.drain(..n));
                *remaining -= n;
                *remaining == 0
            }
            Body::Chunked(state) => decode_chunked(&self.limits, state, &mut request.body, buf)?,
        };

        if complete {
            debug!("Decoded {} {} with {} body bytes", request.method, request.path, request.body.len());
            Ok(Some(request))
        } else {
            self.pending = Some((request, body));
            Ok(None)
        }
    }

    fn decode_head(&self, buf: &mut Vec<u8>) -> Result<Option<(HttpRequest, Body)>, Error> {
        // Stray CRLFs between pipelined requests are ignored
        let skip = buf.iter().take_while(|b| matches!(b, b'\r' | b'\n')).count();
        buf.drain(..skip);
        if buf.is_empty() {
            return Ok(None);
        }

        let line_end = buf.iter().position(|&b| b == b'\n');
        let initial_len = match line_end {
            Some(i) if i > 0 && buf[i - 1] == b'\r' => i - 1,
            Some(i) => i,
            None => buf.len(),
        };
        if initial_len > self.limits.max_initial_line_length {
            return Err(Error::InitialLineTooLong(self.limits.max_initial_line_length));
        }
        let Some(line_end) = line_end else {
            return Ok(None);
        };

        let headers_start = line_end + 1;
        let Some(header_len) = find_blank_line(&buf[headers_start..]) else {
            if buf.len() - headers_start > self.limits.max_header_size {
                return Err(Error::HeaderTooLarge(self.limits.max_header_size));
            }
            return Ok(None);
        };
        if header_len > self.limits.max_header_size {
            return Err(Error::HeaderTooLarge(self.limits.max_header_size));
        }

        let head_len = headers_start + header_len;
        let request = parse_request(&buf[..head_len])?;
        buf.drain(..head_len);

        let body = self.body_framing(&request)?;
        Ok(Some((request, body)))
    }

    fn body_framing(&self, request: &HttpRequest) -> Result<Body, Error> {
        // Transfer-Encoding takes precedence over Content-Length
        if request.is_chunked()? {
            return Ok(Body::Chunked(ChunkState::Size));
        }
        match request.content_length()? {
            None | Some(0) => Ok(Body::Empty),
            Some(len) if len > self.limits.max_content_length => {
                Err(Error::BodyTooLarge(self.limits.max_content_length))
            }
            Some(len) => Ok(Body::Fixed { remaining: len }),
        }
    }
}

/// Length of the header section up to and including the first empty line.
fn find_blank_line(bytes: &[u8]) -> Option<usize> {
    let mut start = 0;
    while let Some(offset) = bytes[start..].iter().position(|&b| b == b'\n') {
        let end = start + offset;
        let line = &bytes[start..end];
        if line.is_empty() || line == b"\r" {
            return Some(end + 1);
        }
        start = end + 1;
    }
    None
}

/// Advance a chunked body. Returns true once the last chunk and its trailers
/// have been consumed.
fn decode_chunked(
    limits: &DecoderLimits,
    state: &mut ChunkState,
    body: &mut Vec<u8>,
    buf: &mut Vec<u8>,
) -> Result<bool, Error> {
    loop {
        match *state {
            ChunkState::Size => {
                let Some(i) = buf.iter().position(|&b| b == b'\n') else {
                    if buf.len() > limits.max_initial_line_length {
                        return Err(Error::InvalidChunkSize("chunk-size line too long".to_string()));
                    }
                    return Ok(false);
                };
                let line = String::from_utf8_lossy(&buf[..i]).into_owned();
                buf.drain(..=i);

                // Chunk extensions after ';' are ignored
                let size_str = line.trim_end_matches('\r').split(';').next().unwrap_or("").trim();
                let size = usize::from_str_radix(size_str, 16)
                    .map_err(|_| Error::InvalidChunkSize(size_str.to_string()))?;

                if size == 0 {
                    *state = ChunkState::Trailers;
                } else {
                    if body.len().saturating_add(size) > limits.max_content_length {
                        return Err(Error::BodyTooLarge(limits.max_content_length));
                    }
                    *state = ChunkState::Data { remaining: size };
                }
            }
            ChunkState::Data { remaining } => {
                let n = remaining.min(buf.len());
                body.extend(buf.drain(..n));
                if n < remaining {
                    *state = ChunkState::Data { remaining: remaining - n };
                    return Ok(false);
                }
                *state = ChunkState::DataEnd;
            }
            ChunkState::DataEnd => {
                if buf.starts_with(b"\r\n") {
                    buf.drain(..2);
                } else if buf.starts_with(b"\n") {
                    buf.drain(..1);
                } else if buf.is_empty() || buf.as_slice() == b"\r" {
                    return Ok(false);
                } else {
                    return Err(Error::InvalidChunkSize("missing CRLF after chunk data".to_string()));
                }
                *state = ChunkState::Size;
            }
            ChunkState::Trailers => {
                let Some(i) = buf.iter().position(|&b| b == b'\n') else {
                    if buf.len() > limits.max_header_size {
                        return Err(Error::HeaderTooLarge(limits.max_header_size));
                    }
                    return Ok(false);
                };
                let blank = i == 0 || (i == 1 && buf[0] == b'\r');
                buf.drain(..=i);
                if blank {
                    return Ok(true);
                }
                // trailer fields are discarded
            }
        }
    }
}
