//! Lock-free double buffer for telemetry frames.
//!
//! A realtime producer (the audio thread) publishes fixed-length `f32`
//! frames; a consumer (the UI) picks up the latest one when it gets around
//! to it. The writer never blocks and never allocates after construction.
//!
//! Two slots are shared. The state word holds the index of the front slot
//! and a `FRESH` bit meaning "published, not yet consumed":
//!
//! - the writer only touches a slot while `FRESH` is clear, writes the back
//!   slot, then publishes `back | FRESH` with release ordering
//! - the reader only touches the front slot while `FRESH` is set and clears
//!   the bit with release ordering once its copy is done
//!
//! A frame published while the previous one is still unconsumed is dropped
//! and counted, so the reader never observes a partially written frame.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::SyncError;

const FRONT: usize = 0b01;
const FRESH: usize = 0b10;

struct Shared {
    slots: [UnsafeCell<Box<[f32]>>; 2],
    state: AtomicUsize,
    published: AtomicU64,
    dropped: AtomicU64,
}

// SAFETY: slot access is partitioned by the FRESH bit. Only the writer
// touches the slots while it is clear, only the reader while it is set, and
// each side hands over with a release store observed by an acquire load.
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

/// Counters shared by both ends of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryStats {
    pub published: u64,
    pub dropped: u64,
}

/// Creates a channel carrying frames of `frame_len` samples.
pub fn telemetry_channel(frame_len: usize) -> (TelemetryWriter, TelemetryReader) {
    let slot = || UnsafeCell::new(vec![0.0f32; frame_len].into_boxed_slice());
    let shared = Arc::new(Shared {
        slots: [slot(), slot()],
        state: AtomicUsize::new(0),
        published: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
    });
    (
        TelemetryWriter {
            shared: shared.clone(),
            frame_len,
        },
        TelemetryReader { shared, frame_len },
    )
}

fn stats(shared: &Shared) -> TelemetryStats {
    TelemetryStats {
        published: shared.published.load(Ordering::Relaxed),
        dropped: shared.dropped.load(Ordering::Relaxed),
    }
}

/// Producer end. Not `Clone`: there is exactly one writer.
pub struct TelemetryWriter {
    shared: Arc<Shared>,
    frame_len: usize,
}

impl TelemetryWriter {
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Fills the back slot with `fill` and publishes it.
    ///
    /// Returns `false` without calling `fill` when the reader has not yet
    /// consumed the previous frame.
    pub fn publish(&mut self, fill: impl FnOnce(&mut [f32])) -> bool {
        let state = self.shared.state.load(Ordering::Acquire);
        if state & FRESH != 0 {
            let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(dropped, "telemetry frame dropped, reader is behind");
            return false;
        }
        let back = (state & FRONT) ^ 1;
        // SAFETY: FRESH is clear, so the reader holds no reference to either
        // slot until we publish below.
        let slot = unsafe { &mut *self.shared.slots[back].get() };
        fill(slot);
        self.shared.state.store(back | FRESH, Ordering::Release);
        self.shared.published.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Copies `frame` into the back slot and publishes it.
    pub fn write(&mut self, frame: &[f32]) -> Result<bool, SyncError> {
        if frame.len() != self.frame_len {
            return Err(SyncError::FrameLength {
                expected: self.frame_len,
                actual: frame.len(),
            });
        }
        Ok(self.publish(|slot| slot.copy_from_slice(frame)))
    }

    pub fn stats(&self) -> TelemetryStats {
        stats(&self.shared)
    }
}

/// Consumer end. Not `Clone`: there is exactly one reader.
pub struct TelemetryReader {
    shared: Arc<Shared>,
    frame_len: usize,
}

impl TelemetryReader {
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn has_frame(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) & FRESH != 0
    }

    /// Hands the pending frame to `consume` and marks it consumed.
    ///
    /// Returns `None` when nothing new was published since the last read.
    pub fn consume<R>(&mut self, consume: impl FnOnce(&[f32]) -> R) -> Option<R> {
        let state = self.shared.state.load(Ordering::Acquire);
        if state & FRESH == 0 {
            return None;
        }
        // SAFETY: FRESH is set, so the writer will not touch any slot until
        // we clear it.
        let slot = unsafe { &*self.shared.slots[state & FRONT].get() };
        let result = consume(slot);
        self.shared.state.fetch_and(!FRESH, Ordering::Release);
        Some(result)
    }

    /// Copies the pending frame into `out`. Returns `Ok(false)` when there is
    /// no new frame; `out` is then left untouched.
    pub fn read(&mut self, out: &mut [f32]) -> Result<bool, SyncError> {
        if out.len() != self.frame_len {
            return Err(SyncError::FrameLength {
                expected: self.frame_len,
                actual: out.len(),
            });
        }
        Ok(self.consume(|frame| out.copy_from_slice(frame)).is_some())
    }

    pub fn stats(&self) -> TelemetryStats {
        stats(&self.shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_channel_has_nothing_to_read() {
        let (_writer, mut reader) = telemetry_channel(4);
        let mut out = [9.0; 4];
        assert!(!reader.read(&mut out).unwrap());
        assert_eq!(out, [9.0; 4]);
    }

    #[test]
    fn second_frame_is_dropped_until_consumed() {
        let (mut writer, mut reader) = telemetry_channel(2);
        assert!(writer.write(&[1.0, 2.0]).unwrap());
        assert!(!writer.write(&[3.0, 4.0]).unwrap());

        let mut out = [0.0; 2];
        assert!(reader.read(&mut out).unwrap());
        assert_eq!(out, [1.0, 2.0]);
        assert!(!reader.read(&mut out).unwrap());

        assert!(writer.write(&[5.0, 6.0]).unwrap());
        assert!(reader.read(&mut out).unwrap());
        assert_eq!(out, [5.0, 6.0]);
        assert_eq!(
            reader.stats(),
            TelemetryStats {
                published: 2,
                dropped: 1
            }
        );
    }

    #[test]
    fn wrong_length_is_rejected() {
        let (mut writer, mut reader) = telemetry_channel(3);
        assert!(matches!(
            writer.write(&[1.0]),
            Err(SyncError::FrameLength {
                expected: 3,
                actual: 1
            })
        ));
        let mut out = [0.0; 4];
        assert!(matches!(
            reader.read(&mut out),
            Err(SyncError::FrameLength { .. })
        ));
    }

    #[test]
    fn publish_skips_fill_when_dropping() {
        let (mut writer, _reader) = telemetry_channel(1);
        assert!(writer.publish(|slot| slot[0] = 1.0));
        let mut called = false;
        assert!(!writer.publish(|_| called = true));
        assert!(!called);
    }
}
