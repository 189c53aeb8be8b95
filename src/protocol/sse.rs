// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental Server-Sent Events decoder for push streams.

use crate::error::ProtocolError;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if present.
    pub event_type: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

/// Decodes SSE frames from arbitrarily split chunks.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across chunks are decoded correctly. Both the pending
/// line and the data of the pending event are capped at `max_frame` bytes.
#[derive(Debug)]
pub struct SseParser {
    buffer: Vec<u8>,
    event_type: Option<String>,
    data: Vec<String>,
    data_len: usize,
    max_frame: usize,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SseParser {
    /// Default cap on one line or one event's data.
    pub const DEFAULT_MAX_FRAME: usize = 1024 * 1024;

    /// Creates an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame(Self::DEFAULT_MAX_FRAME)
    }

    /// Creates an empty parser with a custom frame cap.
    #[must_use]
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event_type: None,
            data: Vec::new(),
            data_len: 0,
            max_frame,
        }
    }

    /// Feeds a chunk and returns every event it completed.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::FrameTooLarge` once a line or an event grows
    /// past the cap. The parser should not be fed again after that.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, ProtocolError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line[..newline]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else if line.starts_with(':') {
                // keepalive comment
            } else {
                let (field, value) = line.split_once(':').unwrap_or((line, ""));
                let value = value.strip_prefix(' ').unwrap_or(value);
                match field {
                    "event" => self.event_type = Some(value.to_string()),
                    "data" => {
                        self.data_len += value.len() + 1;
                        if self.data_len > self.max_frame {
                            return Err(self.overflow());
                        }
                        self.data.push(value.to_string());
                    }
                    _ => {}
                }
            }
        }

        if self.buffer.len() > self.max_frame {
            return Err(self.overflow());
        }
        Ok(events)
    }

    fn overflow(&mut self) -> ProtocolError {
        self.buffer.clear();
        self.data.clear();
        self.data_len = 0;
        ProtocolError::FrameTooLarge {
            limit: self.max_frame,
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event_type = None;
            return None;
        }
        self.data_len = 0;
        Some(SseEvent {
            event_type: self.event_type.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl SseParser {
        fn feed_ok(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
            self.feed(chunk).unwrap()
        }
    }

    #[test]
    fn single_event() {
        let mut parser = SseParser::new();
        let events = parser.feed_ok(b"event: update\ndata: {\"odometer\":1}\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event_type: Some("update".to_string()),
                data: r#"{"odometer":1}"#.to_string(),
            }]
        );
    }

    #[test]
    fn chunk_split_mid_line() {
        let mut parser = SseParser::new();
        assert!(parser.feed_ok(b"data: {\"a\"").is_empty());
        let events = parser.feed_ok(b":1}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, r#"{"a":1}"#);
        assert_eq!(events[0].event_type, None);
    }

    #[test]
    fn chunk_split_inside_utf8_character() {
        let bytes = "data: \"é\"\n\n".as_bytes();
        let mut parser = SseParser::new();
        assert!(parser.feed_ok(&bytes[..8]).is_empty());
        let events = parser.feed_ok(&bytes[8..]);
        assert_eq!(events[0].data, "\"é\"");
    }

    #[test]
    fn multi_line_data_and_comments() {
        let mut parser = SseParser::new();
        let events = parser.feed_ok(b": ping\ndata: [1,\ndata: 2]\n\n: ping\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "[1,\n2]");
    }

    #[test]
    fn event_without_data_is_dropped() {
        let mut parser = SseParser::new();
        assert!(parser.feed_ok(b"event: heartbeat\n\n").is_empty());
        let events = parser.feed_ok(b"data:x\n\n");
        assert_eq!(events[0].event_type, None);
    }

    #[test]
    fn unterminated_line_overflows() {
        let mut parser = SseParser::with_max_frame(16);
        assert!(parser.feed(b"data: 0123456").unwrap().is_empty());

        let err = parser.feed(b"789abcdef").unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { limit: 16 }));
    }

    #[test]
    fn event_without_blank_line_overflows() {
        let mut parser = SseParser::with_max_frame(16);
        assert!(parser.feed(b"data: 01234\ndata: 56789\n").unwrap().is_empty());

        let err = parser.feed(b"data: abcdef\n").unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { limit: 16 }));
    }

    #[test]
    fn frame_cap_resets_per_event() {
        let mut parser = SseParser::with_max_frame(16);
        for _ in 0..4 {
            let events = parser.feed(b"data: 0123456789\n\n").unwrap();
            assert_eq!(events.len(), 1);
        }
    }
}
