use super::payload::ChatDelta;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text to append to the open assistant message.
    Delta(String),
    /// `data: [DONE]`; nothing after it is processed.
    Done,
}

/// Incremental decoder for the chat event stream.
///
/// Bytes are buffered until a full line is available, so a JSON payload or a
/// UTF-8 sequence split across reads is decoded once the rest arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to hold no newline.
    scanned: usize,
    done: bool,
}

impl SseDecoder {
    /// Feed one read from the transport and drain the events it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        self.pending.extend_from_slice(bytes);

        while let Some(offset) = self.pending[self.scanned..].iter().position(|b| *b == b'\n') {
            let pos = self.scanned + offset;
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.scanned = 0;
            if self.push_line(&line[..pos], &mut events) {
                break;
            }
        }
        self.scanned = self.pending.len();

        events
    }

    /// Flush a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done || self.pending.is_empty() {
            return events;
        }
        let line = std::mem::take(&mut self.pending);
        self.scanned = 0;
        self.push_line(&line, &mut events);
        events
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decode a single line. Returns true once the stream is complete.
    fn push_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) -> bool {
        let text = String::from_utf8_lossy(raw);
        let line = text.strip_suffix('\r').unwrap_or(&text);
        match parse_data_line(line) {
            Some(StreamEvent::Done) => {
                self.done = true;
                self.pending.clear();
                events.push(StreamEvent::Done);
                true
            }
            Some(event) => {
                events.push(event);
                false
            }
            None => false,
        }
    }
}

/// Interpret one line of the stream. Only `data: ` lines are significant.
pub fn parse_data_line(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    if payload.trim() == DONE_MARKER {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<ChatDelta>(payload) {
        Ok(delta) => delta
            .content
            .filter(|piece| !piece.is_empty())
            .map(StreamEvent::Delta),
        Err(err) => {
            tracing::debug!(%err, "skipping malformed stream frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> StreamEvent {
        StreamEvent::Delta(text.to_string())
    }

    #[test]
    fn parses_content_frames() {
        let mut decoder = SseDecoder::default();
        let events = decoder.feed(b"data: {\"content\":\"Hel\"}\n\ndata: {\"content\":\"lo\"}\n\n");
        assert_eq!(events, vec![delta("Hel"), delta("lo")]);
        assert!(!decoder.is_done());
    }

    #[test]
    fn done_stops_processing() {
        let mut decoder = SseDecoder::default();
        let events = decoder.feed(b"data: {\"content\":\"a\"}\n\ndata: [DONE]\n\ndata: {\"content\":\"b\"}\n\n");
        assert_eq!(events, vec![delta("a"), StreamEvent::Done]);
        assert!(decoder.is_done());
        assert!(decoder.feed(b"data: {\"content\":\"c\"}\n\n").is_empty());
    }

    #[test]
    fn json_split_across_reads_is_reassembled() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(b"data: {\"cont").is_empty());
        assert!(decoder.feed(b"ent\":\"whole\"").is_empty());
        assert_eq!(decoder.feed(b"}\n\n"), vec![delta("whole")]);
    }

    #[test]
    fn utf8_split_across_reads_is_reassembled() {
        let frame = "data: {\"content\":\"✓\"}\n\n".as_bytes();
        let split = frame.iter().position(|b| *b == 0xE2).unwrap() + 1;
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(&frame[..split]).is_empty());
        assert_eq!(decoder.feed(&frame[split..]), vec![delta("✓")]);
    }

    #[test]
    fn malformed_and_foreign_lines_are_skipped() {
        let mut decoder = SseDecoder::default();
        let events = decoder.feed(
            b": keep-alive\nevent: message\ndata: {broken\ndata:{\"content\":\"no space\"}\ndata: {\"other\":1}\ndata: {\"content\":\"ok\"}\r\n\r\n",
        );
        assert_eq!(events, vec![delta("ok")]);
    }

    #[test]
    fn byte_at_a_time_reads_only_scan_new_input() {
        let frame = b"data: {\"content\":\"slow drip\"}\n";
        let mut decoder = SseDecoder::default();
        for byte in &frame[..frame.len() - 1] {
            assert!(decoder.feed(std::slice::from_ref(byte)).is_empty());
            assert_eq!(decoder.scanned, decoder.pending.len());
        }
        assert_eq!(decoder.feed(b"\n"), vec![delta("slow drip")]);
        assert_eq!(decoder.scanned, 0);
        assert!(decoder.pending.is_empty());
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(b"data: {\"content\":\"tail\"}").is_empty());
        assert_eq!(decoder.finish(), vec![delta("tail")]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn done_marker_tolerates_trailing_whitespace() {
        assert_eq!(parse_data_line("data: [DONE] "), Some(StreamEvent::Done));
        assert_eq!(parse_data_line("data: {\"content\":\"\"}"), None);
        assert_eq!(parse_data_line("[DONE]"), None);
    }
}
