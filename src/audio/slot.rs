//! Lock-free frame hand-off between the audio callback and the tick thread
//!
//! The audio callback runs on a real-time thread: it must never block, wait
//! for the consumer or report failure upward. Two policies are provided, both
//! split into a producer half ([`FrameSink`], moved into the callback) and a
//! consumer half ([`FrameSource`], owned by the tick thread).
//!
//! ## Latest frame (default)
//!
//! A triple buffer: every publish replaces the previous frame, last write
//! wins. Buffers are swapped atomically, so the reader always sees a whole
//! frame, never a mix of two writes. Frames published between two reads are
//! lost; when nothing was published since the last read, the same frame is
//! read again and reported as [`FrameRead::Repeat`].
//!
//! ## Frame queue
//!
//! A SPSC sample ring sized for `depth` whole frames. No frame is read twice.
//! When the ring has no room for a whole frame, the producer drops the new
//! frame rather than waiting, so the reader may lag behind the device.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};
use serde::{Deserialize, Serialize};
use triple_buffer::TripleBuffer;

/// Which hand-off policy connects the audio thread to the tick thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ingestion {
    /// Last write wins; stale frames are re-read
    #[default]
    Latest,
    /// Bounded queue of whole frames; no repeats
    Queued,
}

/// Outcome of one consumer read
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameRead<'a> {
    /// A frame published since the previous read
    Fresh(&'a [f32]),
    /// The frame returned by the previous read, nothing newer exists
    Repeat(&'a [f32]),
    /// No frame has been published yet (or the queue is empty)
    Pending,
}

impl<'a> FrameRead<'a> {
    pub fn frame(&self) -> Option<&'a [f32]> {
        match *self {
            Self::Fresh(frame) | Self::Repeat(frame) => Some(frame),
            Self::Pending => None,
        }
    }
}

/// Producer-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Frames accepted by the hand-off
    pub published: u64,
    /// Frames the producer discarded because the queue was full
    pub dropped: u64,
}

/// Producer half, owned by the audio thread
pub trait FrameSink: Send {
    /// Samples per frame
    fn frame_len(&self) -> usize;

    /// Hand over one whole frame. Never blocks and never fails.
    ///
    /// Frames whose length differs from [`FrameSink::frame_len`] are ignored.
    fn publish(&mut self, frame: &[f32]);
}

/// Consumer half, owned by the tick thread
pub trait FrameSource {
    /// Samples per frame
    fn frame_len(&self) -> usize;

    /// Read the next frame according to the hand-off policy
    fn read(&mut self) -> FrameRead<'_>;

    /// Snapshot of the producer counters
    fn stats(&self) -> IngestStats;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn frame_len(&self) -> usize {
        (**self).frame_len()
    }

    fn publish(&mut self, frame: &[f32]) {
        (**self).publish(frame)
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn frame_len(&self) -> usize {
        (**self).frame_len()
    }

    fn read(&mut self) -> FrameRead<'_> {
        (**self).read()
    }

    fn stats(&self) -> IngestStats {
        (**self).stats()
    }
}

/// Counters shared by both halves
#[derive(Clone, Default)]
struct Counters {
    published: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl Counters {
    fn snapshot(&self) -> IngestStats {
        IngestStats {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Create both halves for the given policy
///
/// `queue_depth` is only used by [`Ingestion::Queued`] and is raised to 2
/// frames if smaller.
pub fn split(
    ingestion: Ingestion,
    frame_len: usize,
    queue_depth: usize,
) -> (Box<dyn FrameSink>, Box<dyn FrameSource>) {
    match ingestion {
        Ingestion::Latest => {
            let (writer, reader) = latest_frame(frame_len);
            (Box::new(writer), Box::new(reader))
        }
        Ingestion::Queued => {
            let (writer, reader) = frame_queue(frame_len, queue_depth);
            (Box::new(writer), Box::new(reader))
        }
    }
}

/// Create a last-write-wins slot holding one frame of `frame_len` samples
pub fn latest_frame(frame_len: usize) -> (LatestFrameWriter, LatestFrameReader) {
    let (input, output) = TripleBuffer::new(&vec![0.0_f32; frame_len]).split();
    let counters = Counters::default();

    (
        LatestFrameWriter {
            input,
            frame_len,
            counters: counters.clone(),
        },
        LatestFrameReader {
            output,
            frame_len,
            counters,
            seen: false,
        },
    )
}

/// Producer half of the latest-frame slot
pub struct LatestFrameWriter {
    input: triple_buffer::Input<Vec<f32>>,
    frame_len: usize,
    counters: Counters,
}

impl FrameSink for LatestFrameWriter {
    fn frame_len(&self) -> usize {
        self.frame_len
    }

    #[inline]
    fn publish(&mut self, frame: &[f32]) {
        if frame.len() != self.frame_len {
            return;
        }
        // All three buffers are cloned from the same initial frame, so the
        // back buffer always has the right length and nothing allocates here.
        self.input.input_buffer().copy_from_slice(frame);
        self.input.publish();
        self.counters.published.fetch_add(1, Ordering::Relaxed);
    }
}

/// Consumer half of the latest-frame slot
pub struct LatestFrameReader {
    output: triple_buffer::Output<Vec<f32>>,
    frame_len: usize,
    counters: Counters,
    /// Whether any frame has been read; the initial buffer is not a frame
    seen: bool,
}

impl FrameSource for LatestFrameReader {
    fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn read(&mut self) -> FrameRead<'_> {
        let fresh = self.output.updated();
        if !fresh && !self.seen {
            return FrameRead::Pending;
        }
        self.seen = true;

        let frame = self.output.read().as_slice();
        if fresh {
            FrameRead::Fresh(frame)
        } else {
            FrameRead::Repeat(frame)
        }
    }

    fn stats(&self) -> IngestStats {
        self.counters.snapshot()
    }
}

/// Create a queue holding up to `depth` whole frames (at least 2)
pub fn frame_queue(frame_len: usize, depth: usize) -> (FrameQueueWriter, FrameQueueReader) {
    let depth = depth.max(2);
    let rb = HeapRb::<f32>::new(frame_len * depth);
    let (producer, consumer) = rb.split();
    let counters = Counters::default();

    (
        FrameQueueWriter {
            producer,
            frame_len,
            counters: counters.clone(),
        },
        FrameQueueReader {
            consumer,
            frame: vec![0.0; frame_len],
            counters,
        },
    )
}

/// Producer half of the frame queue
pub struct FrameQueueWriter {
    producer: ringbuf::HeapProd<f32>,
    frame_len: usize,
    counters: Counters,
}

impl FrameSink for FrameQueueWriter {
    fn frame_len(&self) -> usize {
        self.frame_len
    }

    #[inline]
    fn publish(&mut self, frame: &[f32]) {
        if frame.len() != self.frame_len {
            return;
        }
        // Only whole frames go in, so the consumer never sees a partial one
        if self.producer.vacant_len() < frame.len() {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.producer.push_slice(frame);
        self.counters.published.fetch_add(1, Ordering::Relaxed);
    }
}

/// Consumer half of the frame queue
pub struct FrameQueueReader {
    consumer: ringbuf::HeapCons<f32>,
    frame: Vec<f32>,
    counters: Counters,
}

impl FrameSource for FrameQueueReader {
    fn frame_len(&self) -> usize {
        self.frame.len()
    }

    fn read(&mut self) -> FrameRead<'_> {
        if self.consumer.occupied_len() < self.frame.len() {
            return FrameRead::Pending;
        }
        self.consumer.pop_slice(&mut self.frame);
        FrameRead::Fresh(&self.frame)
    }

    fn stats(&self) -> IngestStats {
        self.counters.snapshot()
    }
}
