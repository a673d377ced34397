//! Delivery of progress events: the producer-side sink and the consumer-side decoder
//! for the `data: {json}\n\n` frames of the event stream.

use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::models::event::ProgressEvent;

/// Receives events in emission order.
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

impl ProgressSink for Vec<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}

/// A disconnected client drops the receiver; the batch keeps running regardless.
impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn emit(&mut self, event: ProgressEvent) {
        if self.send(event).is_err() {
            debug!("Progress receiver dropped; continuing batch without a listener");
        }
    }
}

/// One `data:` frame, as written on the wire.
pub fn encode_frame(event: &ProgressEvent) -> String {
    match serde_json::to_string(event) {
        Ok(json) => format!("data: {json}\n\n"),
        Err(err) => format!("data: {{\"error\":\"failed to encode event: {err}\"}}\n\n"),
    }
}

/// Incremental decoder tolerant of arbitrary chunk boundaries.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next transport chunk; returns the events it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ProgressEvent> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&byte| byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            match serde_json::from_str::<ProgressEvent>(payload.trim_start()) {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    events.push(event);
                    if terminal {
                        self.finished = true;
                        self.buffer.clear();
                        break;
                    }
                }
                Err(err) => warn!("Skipping malformed event {:?}: {}", payload, err),
            }
        }
        events
    }

    /// True once a `complete` or `error` event has been decoded.
    pub fn finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{LogLine, Phase};

    fn sample() -> Vec<ProgressEvent> {
        vec![
            ProgressEvent::Log(LogLine::info("--- Converting to PNG format ---")),
            ProgressEvent::Progress {
                phase: Phase::Convert,
                current: 1,
                total: 1,
                message: "Processing ünïcode.jpg".into(),
            },
            ProgressEvent::Log(LogLine::success("Processed: ünïcode.jpg")),
            ProgressEvent::Complete { processed: 1 },
        ]
    }

    fn wire(events: &[ProgressEvent]) -> Vec<u8> {
        events.iter().map(encode_frame).collect::<String>().into_bytes()
    }

    #[test]
    fn single_chunk_decodes_everything() {
        let mut decoder = EventDecoder::new();
        assert_eq!(decoder.feed(&wire(&sample())), sample());
        assert!(decoder.finished());
    }

    #[test]
    fn any_chunking_yields_the_same_events() {
        let bytes = wire(&sample());
        for size in 1..=17 {
            let mut decoder = EventDecoder::new();
            let decoded: Vec<ProgressEvent> = bytes
                .chunks(size)
                .flat_map(|chunk| decoder.feed(chunk))
                .collect();
            assert_eq!(decoded, sample(), "chunk size {size}");
        }
    }

    #[test]
    fn empty_chunks_yield_nothing() {
        let mut decoder = EventDecoder::new();
        assert!(decoder.feed(b"").is_empty());
        assert!(decoder.feed(b"data: {\"log\"").is_empty());
        assert!(!decoder.finished());
    }

    #[test]
    fn nothing_follows_a_terminal_event() {
        let mut bytes = wire(&[ProgressEvent::error("ImageMagick not found")]);
        bytes.extend(wire(&[ProgressEvent::Log(LogLine::info("late"))]));

        let mut decoder = EventDecoder::new();
        assert_eq!(
            decoder.feed(&bytes),
            vec![ProgressEvent::error("ImageMagick not found")]
        );
        assert!(decoder.feed(&wire(&sample())).is_empty());
    }

    #[test]
    fn channel_sink_survives_a_dropped_receiver() {
        let (mut tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        tx.emit(ProgressEvent::Complete { processed: 0 });
    }
}
