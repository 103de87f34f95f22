//! Text buffer access and offset-based write-back
//!
//! This module provides the minimal buffer contract the parser and write-back
//! stage consume, an in-memory implementation for testing and embedding, and
//! the replacement planner that applies all edits for one buffer in a single
//! descending-offset pass.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex};

use crate::error::{FailureReason, HoistError, ItemFailure, Result};

/// Minimal text-document contract
///
/// Hosts adapt their editor document to this trait; the core never needs a
/// full editor API. Offsets are byte offsets into the buffer contents.
pub trait TextBuffer: Send {
    /// Stable identity used to serialize write-back across runs
    fn name(&self) -> &str;

    fn line_count(&self) -> usize;

    /// Offset of the first byte of line `line`
    fn line_start_offset(&self, line: usize) -> usize;

    /// Offset one past the last byte of line `line`, excluding the newline
    fn line_end_offset(&self, line: usize) -> usize;

    /// Total length in bytes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text in `range`; empty when the range is out of bounds or splits a
    /// character
    fn text(&self, range: Range<usize>) -> String;

    fn replace(&mut self, range: Range<usize>, text: &str);
}

/// In-memory buffer implementation for testing and simple hosts
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer {
    name: String,
    contents: String,
}

impl MemoryBuffer {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }
}

impl TextBuffer for MemoryBuffer {
    fn name(&self) -> &str {
        &self.name
    }

    fn line_count(&self) -> usize {
        self.contents.split('\n').count()
    }

    fn line_start_offset(&self, line: usize) -> usize {
        let mut offset = 0;
        for (i, l) in self.contents.split('\n').enumerate() {
            if i == line {
                return offset;
            }
            offset += l.len() + 1;
        }
        self.contents.len()
    }

    fn line_end_offset(&self, line: usize) -> usize {
        let start = self.line_start_offset(line);
        match self.contents[start..].find('\n') {
            Some(i) => start + i,
            None => self.contents.len(),
        }
    }

    fn len(&self) -> usize {
        self.contents.len()
    }

    fn text(&self, range: Range<usize>) -> String {
        self.contents
            .get(range)
            .map(str::to_string)
            .unwrap_or_default()
    }

    fn replace(&mut self, range: Range<usize>, text: &str) {
        self.contents.replace_range(range, text);
    }
}

/// One planned text replacement
///
/// Carries the text expected at the range so a buffer that changed since the
/// plan was computed is detected and skipped instead of edited over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// Logical image name, for failure reporting
    pub image: String,
    pub start: usize,
    pub end: usize,
    pub expected: String,
    pub text: String,
}

/// Apply a batch of replacements to one buffer in a single mutation pass.
///
/// Replacements are applied in descending start order so offsets computed
/// against one snapshot stay valid while each edit shifts subsequent text.
/// A range whose live text no longer matches `expected` is skipped and
/// recorded as a conflict. Returns the number of applied replacements and the
/// conflicts.
pub fn apply_replacements(
    buffer: &mut dyn TextBuffer,
    mut plan: Vec<Replacement>,
) -> (usize, Vec<ItemFailure>) {
    plan.sort_by(|a, b| b.start.cmp(&a.start));

    let mut applied = 0;
    let mut conflicts = Vec::new();
    for rep in plan {
        let live = if rep.end <= buffer.len() {
            buffer.text(rep.start..rep.end)
        } else {
            String::new()
        };
        if live != rep.expected {
            conflicts.push(ItemFailure {
                image: rep.image,
                reason: FailureReason::WriteBackConflict {
                    expected: rep.expected,
                    found: live,
                },
            });
            continue;
        }
        buffer.replace(rep.start..rep.end, &rep.text);
        applied += 1;
    }
    (applied, conflicts)
}

/// Serializes write-back per buffer identity
///
/// Two concurrent runs that target the same buffer name take turns for the
/// plan-and-apply critical section; runs touching distinct buffers proceed
/// independently.
#[derive(Debug, Default)]
pub struct WriteGate {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl WriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding write-back for `buffer_name`
    pub fn lock_for(&self, buffer_name: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| HoistError::Task("write gate lock poisoned".to_string()))?;
        Ok(locks
            .entry(buffer_name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_buffer_line_offsets() {
        let buf = MemoryBuffer::new("doc.md", "first\nsecond\nthird");
        assert_eq!(buf.line_count(), 3);
        assert_eq!(buf.line_start_offset(0), 0);
        assert_eq!(buf.line_end_offset(0), 5);
        assert_eq!(buf.line_start_offset(1), 6);
        assert_eq!(buf.line_end_offset(1), 12);
        assert_eq!(buf.text(6..12), "second");
    }

    #[test]
    fn memory_buffer_out_of_bounds_text_is_empty() {
        let buf = MemoryBuffer::new("doc.md", "short");
        assert_eq!(buf.text(2..40), "");
    }

    #[test]
    fn descending_order_keeps_earlier_offsets_valid() {
        // Marks at [5,10) and [20,26); the second replacement is longer than
        // what it replaces, which would shift the second range if applied
        // ascending without adjustment.
        let mut buf = MemoryBuffer::new("doc.md", "xxxxxAAAAAyyyyyyyyyyBBBBBBzz");
        let plan = vec![
            Replacement {
                image: "a".into(),
                start: 5,
                end: 10,
                expected: "AAAAA".into(),
                text: "longer-than-before".into(),
            },
            Replacement {
                image: "b".into(),
                start: 20,
                end: 26,
                expected: "BBBBBB".into(),
                text: "B2".into(),
            },
        ];
        let (applied, conflicts) = apply_replacements(&mut buf, plan);
        assert_eq!(applied, 2);
        assert!(conflicts.is_empty());
        assert_eq!(buf.contents(), "xxxxxlonger-than-beforeyyyyyyyyyyB2zz");
    }

    #[test]
    fn ascending_naive_application_corrupts_later_ranges() {
        // Regression baseline: applying in ascending order while re-using
        // stale offsets edits the wrong bytes once an earlier replacement
        // changes the text length.
        let mut buf = MemoryBuffer::new("doc.md", "xxxxxAAAAAyyyyyyyyyyBBBBBBzz");
        let mut plan = vec![
            Replacement {
                image: "a".into(),
                start: 5,
                end: 10,
                expected: "AAAAA".into(),
                text: "longer-than-before".into(),
            },
            Replacement {
                image: "b".into(),
                start: 20,
                end: 26,
                expected: "BBBBBB".into(),
                text: "B2".into(),
            },
        ];
        plan.sort_by(|a, b| a.start.cmp(&b.start));
        for rep in &plan {
            buf.replace(rep.start..rep.end, &rep.text);
        }
        // The second range no longer covered BBBBBB when it was applied.
        assert_ne!(buf.contents(), "xxxxxlonger-than-beforeyyyyyyyyyyB2zz");

        // The guarded planner detects exactly this instead of corrupting.
        let mut fresh = MemoryBuffer::new("doc.md", "xxxxxAAAAAyyyyyyyyyyBBBBBBzz");
        fresh.replace(5..10, "longer-than-before");
        let (applied, conflicts) = apply_replacements(
            &mut fresh,
            vec![Replacement {
                image: "b".into(),
                start: 20,
                end: 26,
                expected: "BBBBBB".into(),
                text: "B2".into(),
            }],
        );
        assert_eq!(applied, 0);
        assert_eq!(conflicts.len(), 1);
        assert!(matches!(
            conflicts[0].reason,
            FailureReason::WriteBackConflict { .. }
        ));
    }

    #[test]
    fn conflicting_range_is_skipped_not_applied() {
        let mut buf = MemoryBuffer::new("doc.md", "hello world");
        let (applied, conflicts) = apply_replacements(
            &mut buf,
            vec![Replacement {
                image: "x".into(),
                start: 0,
                end: 5,
                expected: "HELLO".into(),
                text: "bye".into(),
            }],
        );
        assert_eq!(applied, 0);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(buf.contents(), "hello world");
    }

    #[test]
    fn out_of_range_plan_is_a_conflict() {
        let mut buf = MemoryBuffer::new("doc.md", "tiny");
        let (applied, conflicts) = apply_replacements(
            &mut buf,
            vec![Replacement {
                image: "x".into(),
                start: 10,
                end: 20,
                expected: "whatever".into(),
                text: "y".into(),
            }],
        );
        assert_eq!(applied, 0);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(buf.contents(), "tiny");
    }

    #[tokio::test]
    async fn write_gate_hands_out_one_lock_per_name() {
        let gate = WriteGate::new();
        let a = gate.lock_for("doc.md").unwrap();
        let b = gate.lock_for("doc.md").unwrap();
        let c = gate.lock_for("other.md").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
