//! Incremental Server-Sent Events decoder
//!
//! Bytes are fed as they arrive; complete events (terminated by a blank
//! line) are decoded from the buffer and partial input is kept until the
//! next feed.

use std::fmt;

use bytes::{Buf, BytesMut};

/// Default maximum buffer size (4 MB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
pub enum SseError {
    /// A line was not valid UTF-8
    InvalidUtf8,
    /// Buffer overflow
    BufferOverflow { size: usize, max: usize },
}

impl std::error::Error for SseError {}

impl fmt::Display for SseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUtf8 => write!(f, "SSE line is not valid UTF-8"),
            Self::BufferOverflow { size, max } => {
                write!(f, "SSE buffer overflow: {} bytes (max {})", size, max)
            }
        }
    }
}

/// A dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

pub struct SseDecoder {
    buffer: BytesMut,
    event: Option<String>,
    data: Vec<String>,
    max_buffer_size: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::with_max_buffer(DEFAULT_MAX_BUFFER_SIZE)
    }

    pub fn with_max_buffer(max_buffer_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            event: None,
            data: Vec::new(),
            max_buffer_size,
        }
    }

    pub fn feed(&mut self, data: &[u8]) -> Result<(), SseError> {
        let new_size = self.buffer.len() + data.len();
        if new_size > self.max_buffer_size {
            return Err(SseError::BufferOverflow {
                size: new_size,
                max: self.max_buffer_size,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Next complete event, `Ok(None)` when more input is needed
    pub fn decode(&mut self) -> Result<Option<SseEvent>, SseError> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw = self.buffer.split_to(pos);
            self.buffer.advance(1);

            let line = std::str::from_utf8(&raw).map_err(|_| SseError::InvalidUtf8)?;
            let line = line.strip_suffix('\r').unwrap_or(line);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    return Ok(Some(event));
                }
                continue;
            }
            self.process_line(line);
        }
        Ok(None)
    }

    pub fn decode_iter(&mut self) -> DecodeIter<'_> {
        DecodeIter { decoder: self }
    }

    /// Flush an event left unterminated at end of input
    pub fn finish(&mut self) -> Result<Option<SseEvent>, SseError> {
        if !self.buffer.is_empty() {
            let raw = self.buffer.split();
            let line = std::str::from_utf8(&raw).map_err(|_| SseError::InvalidUtf8)?;
            let line = line.strip_suffix('\r').unwrap_or(line);
            self.process_line(line);
        }
        Ok(self.dispatch())
    }

    fn process_line(&mut self, line: &str) {
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // id and retry carry nothing we use
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data })
    }
}

pub struct DecodeIter<'a> {
    decoder: &'a mut SseDecoder,
}

impl Iterator for DecodeIter<'_> {
    type Item = Result<SseEvent, SseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.decode().transpose()
    }
}
