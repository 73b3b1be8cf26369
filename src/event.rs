//! Telemetry events produced by the relay and the session controller.

/// Local terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
}

impl WindowSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// A single observation mirrored to the collector.
///
/// Events are immutable once built. The producer hands ownership to the
/// queue, and a drain hands it on to the exporter's batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Bytes the session wrote to the local terminal.
    OutputChunk { bytes: Vec<u8> },
    /// The local window was resized.
    Resize { cols: u16, rows: u16 },
}

impl Event {
    pub fn output(bytes: &[u8]) -> Self {
        Event::OutputChunk {
            bytes: bytes.to_vec(),
        }
    }

    pub fn resize(size: WindowSize) -> Self {
        Event::Resize {
            cols: size.cols,
            rows: size.rows,
        }
    }

    /// Number of output bytes carried, zero for resizes.
    pub fn byte_len(&self) -> usize {
        match self {
            Event::OutputChunk { bytes } => bytes.len(),
            Event::Resize { .. } => 0,
        }
    }
}

/// One batch, partitioned by event kind for delivery.
///
/// Output fragments keep their arrival order; `cols` and `rows` are parallel
/// lists in the order the resizes arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub content: Vec<Vec<u8>>,
    pub cols: Vec<u16>,
    pub rows: Vec<u16>,
}

impl Payload {
    /// Consume a drained batch. The events are dropped as they are moved in.
    pub fn from_batch(batch: impl IntoIterator<Item = Event>) -> Self {
        let mut payload = Payload::default();
        for event in batch {
            match event {
                Event::OutputChunk { bytes } => payload.content.push(bytes),
                Event::Resize { cols, rows } => {
                    payload.cols.push(cols);
                    payload.rows.push(rows);
                }
            }
        }
        payload
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.cols.is_empty()
    }

    /// Total number of events represented.
    pub fn event_count(&self) -> usize {
        self.content.len() + self.cols.len()
    }

    pub fn content_bytes(&self) -> usize {
        self.content.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_partitions_by_kind_preserving_order() {
        let batch = vec![
            Event::output(b"a"),
            Event::resize(WindowSize::new(100, 30)),
            Event::output(b"b"),
            Event::resize(WindowSize::new(132, 43)),
            Event::output(b"c"),
        ];

        let payload = Payload::from_batch(batch);
        assert_eq!(payload.content, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(payload.cols, vec![100, 132]);
        assert_eq!(payload.rows, vec![30, 43]);
        assert_eq!(payload.event_count(), 5);
        assert_eq!(payload.content_bytes(), 3);
    }

    #[test]
    fn empty_batch_makes_empty_payload() {
        let payload = Payload::from_batch(Vec::new());
        assert!(payload.is_empty());
    }

    #[test]
    fn resize_only_payload_is_not_empty() {
        let payload = Payload::from_batch(vec![Event::resize(WindowSize::default())]);
        assert!(!payload.is_empty());
        assert_eq!(payload.cols, vec![80]);
        assert_eq!(payload.rows, vec![24]);
    }

    #[test]
    fn byte_len_counts_output_only() {
        assert_eq!(Event::output(b"hello").byte_len(), 5);
        assert_eq!(Event::resize(WindowSize::new(132, 43)).byte_len(), 0);
    }
}
