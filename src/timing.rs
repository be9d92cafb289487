//! Timing script parsing
//!
//! The `timing` file of a capture lists one write per line:
//!
//! ```text
//! S 100 0.000     # 100 samples, due at T0
//! E 2 0.120       # the next two event records, due 120ms after T0
//! ```
//!
//! Event lines consume records from the events file in order, so the parser walks the
//! event blob with a cursor that persists across the whole script. Lines that do not
//! parse are logged, recorded in [`TimingScript::malformed`] and skipped.

use std::fmt;
use tracing::{debug, warn};

use crate::capture::format::event_record_size_at;
use crate::types::{Payload, WriteOperation};
use crate::{PlaybackError, Result};

/// Why a timing line was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Not exactly three whitespace-separated fields
    FieldCount,
    /// First field is neither `S` nor `E`
    UnknownKind,
    /// Count is not a positive integer, or its byte size overflows
    InvalidCount,
    /// Time is not a finite, non-negative number of seconds
    InvalidTime,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MalformedReason::FieldCount => "expected '<S|E> <count> <time>'",
            MalformedReason::UnknownKind => "invalid timing definition",
            MalformedReason::InvalidCount => "count must be a positive integer",
            MalformedReason::InvalidTime => "time must be a non-negative number of seconds",
        })
    }
}

/// A skipped timing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    pub line: usize,
    pub text: String,
    pub reason: MalformedReason,
}

/// Parsed timing script.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingScript {
    operations: Vec<WriteOperation>,
    total_samples: u64,
    total_events: u64,
    bytes_per_sample: usize,
    malformed: Vec<MalformedLine>,
}

enum Directive {
    Samples,
    Events,
}

impl TimingScript {
    /// Parse `text` against the resident event records.
    ///
    /// Fails only when an event line asks for more records than `events` holds, or when
    /// the operation list cannot grow.
    pub fn parse(text: &str, events: &[u8], bytes_per_sample: usize) -> Result<Self> {
        let mut script = Self {
            operations: Vec::new(),
            total_samples: 0,
            total_events: 0,
            bytes_per_sample,
            malformed: Vec::new(),
        };
        let mut event_cursor = 0usize;
        let mut sample_cursor = 0u64;

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            if raw.trim().is_empty() {
                continue;
            }

            let (directive, count, time) = match parse_fields(raw) {
                Ok(fields) => fields,
                Err(reason) => {
                    script.skip(line, raw, reason);
                    continue;
                }
            };

            let payload = match directive {
                Directive::Samples => {
                    let Some(byte_size) = (count as usize).checked_mul(bytes_per_sample) else {
                        script.skip(line, raw, MalformedReason::InvalidCount);
                        continue;
                    };
                    let payload = Payload::SampleBlock {
                        sample_count: count,
                        byte_offset: sample_cursor,
                        byte_size,
                    };
                    sample_cursor += byte_size as u64;
                    script.total_samples += u64::from(count);
                    payload
                }
                Directive::Events => {
                    let byte_offset = event_cursor;
                    for walked in 0..count {
                        let size = event_record_size_at(events, event_cursor).ok_or(
                            PlaybackError::EventOverrun {
                                line,
                                requested: count,
                                walked,
                                offset: event_cursor,
                            },
                        )?;
                        script.total_events += 1;
                        debug!(
                            "{}. event:  {} bytes @ {}",
                            script.total_events, size, event_cursor
                        );
                        event_cursor += size;
                    }
                    Payload::EventBatch {
                        event_count: count,
                        byte_offset,
                        byte_size: event_cursor - byte_offset,
                    }
                }
            };

            script.operations.try_reserve(1).map_err(|_| {
                PlaybackError::out_of_memory(
                    "the write operation list",
                    (script.operations.len() + 1) * std::mem::size_of::<WriteOperation>(),
                )
            })?;
            script.operations.push(WriteOperation { scheduled_time: time, payload, line });
        }

        debug!(
            "Parsed {} write operations ({} samples, {} events, {} skipped lines)",
            script.operations.len(),
            script.total_samples,
            script.total_events,
            script.malformed.len()
        );
        Ok(script)
    }

    fn skip(&mut self, line: usize, raw: &str, reason: MalformedReason) {
        warn!("Skipping timing line {}: {} ({:?})", line, reason, raw.trim());
        self.malformed.push(MalformedLine { line, text: raw.to_string(), reason });
    }

    /// Operations in script order.
    pub fn operations(&self) -> &[WriteOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    /// Sample bytes the script needs from the `samples` file.
    pub fn sample_bytes(&self) -> u64 {
        self.total_samples.saturating_mul(self.bytes_per_sample as u64)
    }

    pub fn malformed(&self) -> &[MalformedLine] {
        &self.malformed
    }

    /// First operation scheduled earlier than the one before it, if any.
    pub fn first_out_of_order(&self) -> Option<&WriteOperation> {
        self.operations
            .windows(2)
            .find(|pair| pair[1].scheduled_time < pair[0].scheduled_time)
            .map(|pair| &pair[1])
    }
}

fn parse_fields(raw: &str) -> std::result::Result<(Directive, u32, f64), MalformedReason> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    let [kind, count, time] = fields.as_slice() else {
        return Err(MalformedReason::FieldCount);
    };

    let directive = match *kind {
        "S" => Directive::Samples,
        "E" => Directive::Events,
        _ => return Err(MalformedReason::UnknownKind),
    };

    let count = match count.parse::<u32>() {
        Ok(count) if count > 0 => count,
        _ => return Err(MalformedReason::InvalidCount),
    };

    let time = match time.parse::<f64>() {
        Ok(time) if time.is_finite() && time >= 0.0 => time,
        _ => return Err(MalformedReason::InvalidTime),
    };

    Ok((directive, count, time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::event_blob;
    use crate::types::OperationKind;
    use proptest::prelude::*;

    #[test]
    fn sample_and_event_lines() {
        let events = event_blob(&[(b"a", b"1"), (b"bb", b"22"), (b"ccc", b"333")]);
        let script = TimingScript::parse("S 10 0.0\nE 2 0.25\nS 5 0.5\nE 1 0.75\n", &events, 8)
            .unwrap();

        assert_eq!(script.len(), 4);
        assert_eq!(script.total_samples(), 15);
        assert_eq!(script.total_events(), 3);
        assert_eq!(script.sample_bytes(), 120);

        let ops = script.operations();
        let block = |sample_count, byte_offset, byte_size| Payload::SampleBlock {
            sample_count,
            byte_offset,
            byte_size,
        };
        let batch = |event_count, byte_offset, byte_size| Payload::EventBatch {
            event_count,
            byte_offset,
            byte_size,
        };
        assert_eq!(ops[0].payload, block(10, 0, 80));
        assert_eq!(ops[1].payload, batch(2, 0, 34 + 36));
        assert_eq!(ops[2].payload, block(5, 80, 40));
        assert_eq!(ops[3].payload, batch(1, 70, 38));
        assert_eq!(ops[1].scheduled_time, 0.25);
        assert_eq!(ops[3].kind(), OperationKind::EventBatch);
        assert_eq!(ops[3].line, 4);
    }

    #[test]
    fn empty_script_has_nothing_to_play() {
        let script = TimingScript::parse("", &[], 4).unwrap();
        assert!(script.is_empty());
        assert_eq!(script.total_samples(), 0);
        assert_eq!(script.total_events(), 0);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let text = "X 5 1.0\nS 10 0.0\nS ten 0.1\nS 0 0.2\nS -3 0.2\nE 1\n\
                    S 4 -1.0\nS 4 nan\nSS 1 0.0\n\nS 2 0.3 extra\n";
        let script = TimingScript::parse(text, &[], 2).unwrap();

        assert_eq!(script.len(), 1);
        assert_eq!(script.total_samples(), 10);

        let reasons: Vec<_> = script.malformed().iter().map(|m| (m.line, m.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (1, MalformedReason::UnknownKind),
                (3, MalformedReason::InvalidCount),
                (4, MalformedReason::InvalidCount),
                (5, MalformedReason::InvalidCount),
                (6, MalformedReason::FieldCount),
                (7, MalformedReason::InvalidTime),
                (8, MalformedReason::InvalidTime),
                (9, MalformedReason::UnknownKind),
                (11, MalformedReason::FieldCount),
            ]
        );
    }

    #[test]
    fn event_overrun_is_fatal() {
        let events = event_blob(&[(b"a", b"1")]);
        let err = TimingScript::parse("E 1 0.0\nE 2 0.5\n", &events, 4).unwrap_err();
        match err {
            PlaybackError::EventOverrun { line, requested, walked, offset } => {
                assert_eq!((line, requested, walked, offset), (2, 2, 0, 34));
            }
            other => panic!("expected EventOverrun, got {other:?}"),
        }
    }

    #[test]
    fn truncated_event_record_is_an_overrun() {
        let mut events = event_blob(&[(b"abc", b"def")]);
        events.pop();
        let err = TimingScript::parse("E 1 0.0\n", &events, 4).unwrap_err();
        assert!(matches!(err, PlaybackError::EventOverrun { walked: 0, .. }));
    }

    #[test]
    fn out_of_order_scripts_are_detected() {
        let script = TimingScript::parse("S 1 0.0\nS 1 1.0\nS 1 0.5\n", &[], 4).unwrap();
        assert_eq!(script.first_out_of_order().map(|op| op.line), Some(3));

        let sorted = TimingScript::parse("S 1 0.0\nS 1 0.0\nS 1 0.5\n", &[], 4).unwrap();
        assert!(sorted.first_out_of_order().is_none());
    }

    fn directive() -> impl Strategy<Value = (bool, u32, f64)> {
        (any::<bool>(), 1u32..50, 0.0f64..10.0)
    }

    proptest! {
        #[test]
        fn parsing_is_deterministic_and_consistent(
            lines in prop::collection::vec(directive(), 0..40),
            bytes_per_sample in 1usize..64,
        ) {
            let event_total: u32 = lines.iter().filter(|l| !l.0).map(|l| l.1).sum();
            let payloads: Vec<(&[u8], &[u8])> =
                (0..event_total).map(|i| (&b"marker"[..(i as usize % 6) + 1], &b"v"[..])).collect();
            let events = event_blob(&payloads);

            let text: String = lines
                .iter()
                .map(|(samples, count, time)| {
                    format!("{} {} {}\n", if *samples { 'S' } else { 'E' }, count, time)
                })
                .collect();

            let first = TimingScript::parse(&text, &events, bytes_per_sample).unwrap();
            let second = TimingScript::parse(&text, &events, bytes_per_sample).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), lines.len());

            let block_bytes: u64 = first
                .operations()
                .iter()
                .filter(|op| op.is_sample_block())
                .map(|op| op.byte_size() as u64)
                .sum();
            prop_assert_eq!(block_bytes, first.sample_bytes());
            prop_assert_eq!(first.total_events(), u64::from(event_total));

            let mut last_offset = 0usize;
            let mut consumed = 0usize;
            for op in first.operations() {
                if let Payload::EventBatch { event_count, byte_offset, byte_size } = op.payload {
                    prop_assert!(byte_offset >= last_offset);
                    prop_assert_eq!(byte_offset, consumed);
                    let mut walked = 0;
                    let mut cursor = byte_offset;
                    while cursor < byte_offset + byte_size {
                        cursor += event_record_size_at(&events, cursor).unwrap();
                        walked += 1;
                    }
                    prop_assert_eq!(walked, event_count);
                    last_offset = byte_offset;
                    consumed = byte_offset + byte_size;
                }
            }
            prop_assert_eq!(consumed, events.len());
        }
    }
}
