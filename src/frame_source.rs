// src/frame_source.rs
//
// Frame hand-off between a producer and the processing loop.
//
// SharedFrameBuffer is a single slot guarded by a mutex, with one condvar for
// "new frame published" and one for "frame taken". The consumer waits for a
// sequence number newer than the last one it processed, copies the frame out
// under the lock and releases it before any processing starts.
//
// ImageSequenceSource replays a directory of images into the buffer, feeding
// recorded ground truth in timestamp order ahead of each frame.

use crate::ground_truth::GroundTruthFeed;
use crate::session::Session;
use crate::types::{Frame, GroundTruthSample, InputConfig, PixelLayout, TimeStamp};
use anyhow::{Context, Result};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

// ============================================================================
// SHARED BUFFER
// ============================================================================

#[derive(Debug, Default)]
struct Slot {
    frame: Option<Frame>,
    sequence: u64,
    consumed: u64,
    closed: bool,
}

/// Result of waiting on the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameWait {
    /// A frame with this sequence number is available.
    Ready(u64),
    TimedOut,
    /// Closed and nothing newer is left to read.
    Closed,
}

#[derive(Debug, Default)]
pub struct SharedFrameBuffer {
    slot: Mutex<Slot>,
    published: Condvar,
    taken: Condvar,
}

/// Scoped read access to the slot. The lock is released on drop.
pub struct FrameGuard<'a> {
    slot: MutexGuard<'a, Slot>,
}

impl FrameGuard<'_> {
    pub fn frame(&self) -> Option<&Frame> {
        self.slot.frame.as_ref()
    }

    pub fn sequence(&self) -> u64 {
        self.slot.sequence
    }
}

impl SharedFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot contents and wake readers. Returns the new sequence number.
    pub fn publish(&self, frame: Frame) -> u64 {
        let mut slot = self.slot.lock();
        slot.frame = Some(frame);
        slot.sequence += 1;
        let sequence = slot.sequence;
        drop(slot);
        self.published.notify_all();
        sequence
    }

    /// Block until a frame newer than `after` exists, the buffer closes, or
    /// `timeout` elapses.
    pub fn wait_for_frame(&self, after: u64, timeout: Duration) -> FrameWait {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        loop {
            if slot.sequence > after && slot.frame.is_some() {
                return FrameWait::Ready(slot.sequence);
            }
            if slot.closed {
                return FrameWait::Closed;
            }
            if self.published.wait_until(&mut slot, deadline).timed_out() {
                return if slot.sequence > after && slot.frame.is_some() {
                    FrameWait::Ready(slot.sequence)
                } else {
                    FrameWait::TimedOut
                };
            }
        }
    }

    pub fn lock(&self) -> FrameGuard<'_> {
        FrameGuard {
            slot: self.slot.lock(),
        }
    }

    /// Wait, lock, clone the frame and release. Marks the frame as taken.
    pub fn copy_out(&self, after: u64, timeout: Duration) -> Result<(u64, Frame), FrameWait> {
        match self.wait_for_frame(after, timeout) {
            FrameWait::Ready(_) => {}
            other => return Err(other),
        }
        let guard = self.lock();
        let sequence = guard.sequence();
        let frame = match guard.frame() {
            Some(frame) => frame.clone(),
            None => return Err(FrameWait::TimedOut),
        };
        drop(guard);
        self.mark_consumed(sequence);
        Ok((sequence, frame))
    }

    fn mark_consumed(&self, sequence: u64) {
        let mut slot = self.slot.lock();
        if sequence > slot.consumed {
            slot.consumed = sequence;
        }
        drop(slot);
        self.taken.notify_all();
    }

    /// Producer side: block until the consumer has taken `sequence` or the buffer closes.
    pub fn wait_until_consumed(&self, sequence: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while slot.consumed < sequence && !slot.closed {
            if self.taken.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.consumed >= sequence
    }

    /// No more frames will be published. Wakes every waiter.
    pub fn close(&self) {
        self.slot.lock().closed = true;
        self.published.notify_all();
        self.taken.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }
}

// ============================================================================
// IMAGE SEQUENCE REPLAY
// ============================================================================

#[derive(Debug, Clone)]
pub struct FrameFile {
    pub path: PathBuf,
    pub timestamp_us: i64,
}

pub struct ImageSequenceSource {
    files: Vec<FrameFile>,
    layout: PixelLayout,
    expected_size: (usize, usize),
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>, input: &InputConfig) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            anyhow::bail!("Frame directory not found: {}", dir.display());
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_image(p))
            .collect();
        paths.sort();

        let files = paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| {
                let timestamp_us = timestamp_from_stem(&path)
                    .unwrap_or(index as i64 * input.frame_interval_us as i64);
                FrameFile { path, timestamp_us }
            })
            .collect::<Vec<_>>();

        info!("Found {} frame files in {}", files.len(), dir.display());

        Ok(Self {
            files,
            layout: input.layout,
            expected_size: (input.width, input.height),
        })
    }

    pub fn files(&self) -> &[FrameFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Publish every frame in order, pausing until each one is consumed.
    /// Closes the buffer on return. Returns the number of frames published.
    pub fn run(
        &self,
        buffer: &SharedFrameBuffer,
        feed: &GroundTruthFeed,
        samples: &[GroundTruthSample],
        session: &Session,
    ) -> Result<usize> {
        let mut published = 0;
        let mut next_sample = 0;

        for file in &self.files {
            // A consumer that has gone away closes the buffer.
            if !session.is_running() || buffer.is_closed() {
                break;
            }

            while let Some(sample) = samples.get(next_sample) {
                if sample.timestamp_us > file.timestamp_us {
                    break;
                }
                feed.on_sample(sample);
                next_sample += 1;
            }

            let frame = match load_frame(&file.path, file.timestamp_us, self.layout) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Skipping {}: {:#}", file.path.display(), e);
                    continue;
                }
            };
            if (frame.width, frame.height) != self.expected_size {
                debug!(
                    "{} is {}x{}, expected {}x{}",
                    file.path.display(),
                    frame.width,
                    frame.height,
                    self.expected_size.0,
                    self.expected_size.1
                );
            }

            let sequence = buffer.publish(frame);
            published += 1;

            while !buffer.wait_until_consumed(sequence, Duration::from_millis(100)) {
                if !session.is_running() || buffer.is_closed() {
                    break;
                }
            }
            if buffer.is_closed() {
                break;
            }
        }

        buffer.close();
        info!("Replay finished: {} frames published", published);
        Ok(published)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// `<micros>` or `<seconds>_<micros>` file stems.
fn timestamp_from_stem(path: &Path) -> Option<i64> {
    let stem = path.file_stem()?.to_str()?;
    match stem.split_once('_') {
        Some((seconds, micros)) => Some(
            TimeStamp {
                seconds: seconds.parse().ok()?,
                microseconds: micros.parse().ok()?,
            }
            .as_micros(),
        ),
        None => stem.parse::<i64>().ok(),
    }
}

/// Decode an image file into a frame with the requested byte layout.
pub fn load_frame(path: &Path, timestamp_us: i64, layout: PixelLayout) -> Result<Frame> {
    let img = image::open(path).with_context(|| format!("Failed to decode {}", path.display()))?;
    let width = img.width() as usize;
    let height = img.height() as usize;

    let data = match layout {
        PixelLayout::Rgb8 => img.to_rgb8().into_raw(),
        PixelLayout::Rgba8 => img.to_rgba8().into_raw(),
        PixelLayout::Bgr8 => {
            let mut raw = img.to_rgb8().into_raw();
            raw.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
            raw
        }
        PixelLayout::Bgra8 => {
            let mut raw = img.to_rgba8().into_raw();
            raw.chunks_exact_mut(4).for_each(|px| px.swap(0, 2));
            raw
        }
    };

    Ok(Frame {
        data,
        width,
        height,
        layout,
        timestamp_us,
    })
}
