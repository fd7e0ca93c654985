use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::close::CloseHandle;
use crate::error::SseError;
use crate::event::StreamEvent;

/// Ceiling on the raw bytes (line endings included) read while assembling a
/// single event.
pub const MAX_EVENT_SIZE: usize = 10 * 1024 * 1024;

pub(crate) type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, SseError>> + Send>>;

/// Line-at-a-time event accumulator.
#[derive(Debug)]
pub(crate) struct EventAssembler {
    event: StreamEvent,
    has_data: bool,
    consumed: usize,
    limit: usize,
}

impl EventAssembler {
    pub fn new(limit: usize) -> Self {
        Self {
            event: StreamEvent::default(),
            has_data: false,
            consumed: 0,
            limit,
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// Feed one physical line, terminator included. Returns the assembled
    /// event once a blank line closes a block that carried data.
    pub fn push_line(&mut self, raw: &[u8]) -> Result<Option<StreamEvent>, SseError> {
        self.consumed = self.consumed.saturating_add(raw.len());
        if self.consumed > self.limit {
            return Err(SseError::EventTooLarge { limit: self.limit });
        }

        let text = String::from_utf8_lossy(raw);
        let line = text.strip_suffix('\n').unwrap_or(&text);
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return Ok(self.has_data.then(|| self.take()));
        }

        if let Some(value) = field_value(line, "data:") {
            if self.has_data {
                self.event.data.push('\n');
                self.event.data.push_str(value);
            } else {
                self.event.data = value.to_owned();
                self.has_data = true;
            }
        } else if let Some(value) = field_value(line, "event:") {
            self.event.event_type = value.to_owned();
        } else if let Some(value) = field_value(line, "id:") {
            self.event.id = value.to_owned();
        }
        // `retry:` is ignored since nothing reconnects; `:` lines are comments.

        Ok(None)
    }

    /// End of input: salvage the pending event if it saw any data.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        self.has_data.then(|| self.take())
    }

    /// Reject a line that is still arriving once it alone would break the
    /// per-event ceiling.
    pub fn check_pending(&self, pending: usize) -> Result<(), SseError> {
        if self.consumed.saturating_add(pending) > self.limit {
            return Err(SseError::EventTooLarge { limit: self.limit });
        }
        Ok(())
    }

    fn take(&mut self) -> StreamEvent {
        self.has_data = false;
        self.consumed = 0;
        std::mem::take(&mut self.event)
    }
}

/// Strips `name` and at most one following space.
fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Buffered reader that splits the owned byte stream into lines and feeds
/// them to an [`EventAssembler`].
pub(crate) struct FrameReader {
    body: Option<ByteStream>,
    buf: BytesMut,
    scanned: usize,
    eof: bool,
    assembler: EventAssembler,
}

impl FrameReader {
    pub fn new(body: ByteStream, limit: usize) -> Self {
        Self {
            body: Some(body),
            buf: BytesMut::new(),
            scanned: 0,
            eof: false,
            assembler: EventAssembler::new(limit),
        }
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.assembler.set_limit(limit);
    }

    /// `Ok(None)` means the peer finished cleanly with nothing pending.
    pub async fn read_event(
        &mut self,
        closer: &CloseHandle,
    ) -> Result<Option<StreamEvent>, SseError> {
        loop {
            if let Some(line) = self.take_line() {
                if let Some(event) = self.assembler.push_line(&line)? {
                    return Ok(Some(event));
                }
                continue;
            }

            if self.eof {
                // A trailing fragment without `\n` never became a line.
                self.buf.clear();
                self.scanned = 0;
                return Ok(self.assembler.finish());
            }

            self.assembler.check_pending(self.buf.len())?;
            self.fill(closer).await?;
        }
    }

    /// Drops the byte stream. Returns `false` if it was already gone.
    pub fn release(&mut self) -> bool {
        if self.body.take().is_some() {
            debug!("released event stream body");
            true
        } else {
            false
        }
    }

    fn take_line(&mut self) -> Option<BytesMut> {
        match self.buf[self.scanned..].iter().position(|byte| *byte == b'\n') {
            Some(offset) => {
                let end = self.scanned + offset;
                self.scanned = 0;
                Some(self.buf.split_to(end + 1))
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }

    async fn fill(&mut self, closer: &CloseHandle) -> Result<(), SseError> {
        let Some(body) = self.body.as_mut() else {
            return Err(SseError::Closed);
        };

        let chunk = tokio::select! {
            biased;
            _ = closer.closed() => None,
            chunk = body.next() => Some(chunk),
        };

        match chunk {
            None => {
                self.release();
                Err(SseError::Closed)
            }
            Some(Some(Ok(bytes))) => {
                self.buf.extend_from_slice(&bytes);
                Ok(())
            }
            Some(Some(Err(error))) => Err(error),
            Some(None) => {
                self.eof = true;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventAssembler, MAX_EVENT_SIZE};
    use crate::error::SseError;
    use crate::event::StreamEvent;

    fn feed(assembler: &mut EventAssembler, lines: &[&str]) -> Vec<StreamEvent> {
        lines
            .iter()
            .filter_map(|line| {
                assembler
                    .push_line(line.as_bytes())
                    .expect("line within limit")
            })
            .collect()
    }

    #[test]
    fn strips_exactly_one_leading_space() {
        let mut assembler = EventAssembler::new(MAX_EVENT_SIZE);
        let events = feed(&mut assembler, &["data:   spaced\n", "\n"]);
        assert_eq!(events, vec![StreamEvent::new("  spaced")]);
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let mut assembler = EventAssembler::new(MAX_EVENT_SIZE);
        let events = feed(
            &mut assembler,
            &["event: message\r\n", "data: hi\r\n", "\r\n"],
        );
        assert_eq!(events, vec![StreamEvent::new("hi").with_type("message")]);
    }

    #[test]
    fn blank_lines_without_data_are_skipped() {
        let mut assembler = EventAssembler::new(MAX_EVENT_SIZE);
        let events = feed(&mut assembler, &["\n", ": keep-alive\n", "\n", "retry: 10\n"]);
        assert!(events.is_empty());
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn finish_salvages_pending_data() {
        let mut assembler = EventAssembler::new(MAX_EVENT_SIZE);
        assert!(feed(&mut assembler, &["id: 9\n", "data: tail\n"]).is_empty());
        assert_eq!(assembler.finish(), Some(StreamEvent::new("tail").with_id("9")));
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn size_counter_resets_after_each_event() {
        let mut assembler = EventAssembler::new(16);
        let events = feed(&mut assembler, &["data: 12345678\n", "\n", "data: abcdefgh\n", "\n"]);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn oversized_event_is_rejected() {
        let mut assembler = EventAssembler::new(8);
        let error = assembler
            .push_line(b"data: too long\n")
            .expect_err("line exceeds limit");
        assert!(matches!(error, SseError::EventTooLarge { limit: 8 }));
    }

    #[test]
    fn pending_partial_line_counts_toward_limit() {
        let mut assembler = EventAssembler::new(8);
        assert!(assembler.check_pending(8).is_ok());
        assert!(matches!(
            assembler.check_pending(9),
            Err(SseError::EventTooLarge { limit: 8 })
        ));
    }
}
