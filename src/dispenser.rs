// src/dispenser.rs
//
// Frame dispenser: wraps a video capture and hands out frames one at a
// time, with a bounded rewind history so the interactive viewer can step
// backward.
//
// Design:
// - Two ring buffers of equal size: raw frames as read, and processed
//   frames returned by the caller after annotation.
// - history_retrieval_point is -1 at the live head and counts down as we
//   back up. Stepping forward through history replays processed frames
//   until the point returns to -1, after which reads come from the file
//   again.
// - The dispenser only learns the file is finished when a read comes up
//   empty, like a paper towel dispenser. next() returns None from then on.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{bail, Result};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

/// Frames of rewind history kept by default.
pub const DEFAULT_HISTORY_SIZE: usize = 20;

pub struct FrameDispenser {
    video: VideoCapture,

    /// Frame number used as a list index. (0-based, -1 before any frame.)
    pub index_frame_number: i32,
    /// Frame number used when people are counting. (1-based.)
    pub counting_frame_number: u32,

    /// -1 at the live head, more negative as we back into history.
    history_retrieval_point: i32,
    raw_buffer: VecDeque<Option<Mat>>,
    processed_buffer: VecDeque<Option<Mat>>,
    buffer_size: usize,

    /// Serve processed frames, if any, rather than raw when backing up.
    processed_history: bool,
    /// Externally visible flag: the last frame served came from history.
    pub in_history: bool,

    current_frame: Option<Mat>,
    is_empty: bool,

    frame_rate: u32,
    /// Frame dimensions, (width, height).
    shape: (i32, i32),
}

impl FrameDispenser {
    pub fn open(path: &Path, history_size: usize, processed_history: bool) -> Result<Self> {
        let path_text = path.to_string_lossy().into_owned();
        let mut video = VideoCapture::from_file(&path_text, videoio::CAP_ANY)?;
        if !video.is_opened()? {
            bail!("can't open video file {}", path.display());
        }

        let frame_rate = video.get(videoio::CAP_PROP_FPS)?.round() as u32;
        let shape = (
            video.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32,
            video.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32,
        );

        Ok(Self {
            video,
            index_frame_number: -1,
            counting_frame_number: 0,
            history_retrieval_point: -1,
            raw_buffer: empty_buffer(history_size),
            processed_buffer: empty_buffer(history_size),
            buffer_size: history_size,
            processed_history,
            in_history: false,
            current_frame: None,
            is_empty: false,
            frame_rate,
            shape,
        })
    }

    /// The next frame, from history if we've backed up, otherwise from the
    /// file. None once the file runs out.
    pub fn next(&mut self) -> Result<Option<Mat>> {
        if self.history_retrieval_point < -1 {
            // Replaying history. in_history stays set until a subsequent
            // call finds us back at the live head.
            self.history_retrieval_point += 1;
            self.increment_frame_number();
            return buffered_frame(&self.processed_buffer, self.history_retrieval_point);
        }
        self.in_history = false;

        if self.is_empty {
            return Ok(None);
        }

        let mut frame = Mat::default();
        let got_frame = self.video.read(&mut frame)?;
        if !got_frame || frame.empty() {
            self.is_empty = true;
            self.video.release()?;
            return Ok(None);
        }

        push_frame(&mut self.raw_buffer, self.buffer_size, frame.try_clone()?);
        self.increment_frame_number();
        self.current_frame = Some(frame.try_clone()?);
        Ok(Some(frame))
    }

    /// Step one frame back into the history buffer. At the buffer limit,
    /// or at frame 0, the current frame is served again.
    pub fn previous(&mut self) -> Result<Option<Mat>> {
        if self.history_retrieval_point.unsigned_abs() as usize == self.buffer_size
            || self.index_frame_number == 0
        {
            return clone_frame(&self.current_frame);
        }

        self.history_retrieval_point -= 1;
        self.decrement_frame_number();
        let frame = if self.processed_history {
            buffered_frame(&self.processed_buffer, self.history_retrieval_point)?
        } else {
            buffered_frame(&self.raw_buffer, self.history_retrieval_point)?
        };
        self.current_frame = clone_frame(&frame)?;
        self.in_history = true;
        Ok(frame)
    }

    /// Called by the processor to shelve a finished frame, served in place
    /// of the raw one when traversing history.
    pub fn processed_frame_return(&mut self, frame: Mat) {
        push_frame(&mut self.processed_buffer, self.buffer_size, frame);
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn shape(&self) -> (i32, i32) {
        self.shape
    }

    fn increment_frame_number(&mut self) {
        self.index_frame_number += 1;
        self.counting_frame_number += 1;
    }

    fn decrement_frame_number(&mut self) {
        self.index_frame_number -= 1;
        self.counting_frame_number -= 1;
    }
}

fn empty_buffer(size: usize) -> VecDeque<Option<Mat>> {
    let mut buffer = VecDeque::with_capacity(size);
    buffer.resize_with(size, || None);
    buffer
}

/// Append on the right, dropping the oldest slot to hold the size.
fn push_frame(buffer: &mut VecDeque<Option<Mat>>, size: usize, frame: Mat) {
    if buffer.len() == size {
        buffer.pop_front();
    }
    buffer.push_back(Some(frame));
}

/// Frame at a negative offset from the newest slot: -1 is the newest,
/// -2 one older, and so on.
fn buffered_frame(buffer: &VecDeque<Option<Mat>>, retrieval_point: i32) -> Result<Option<Mat>> {
    let slot = buffer.len() as i32 + retrieval_point;
    match buffer.get(slot as usize) {
        Some(Some(frame)) => Ok(Some(frame.try_clone()?)),
        _ => Ok(None),
    }
}

fn clone_frame(frame: &Option<Mat>) -> Result<Option<Mat>> {
    match frame {
        Some(frame) => Ok(Some(frame.try_clone()?)),
        None => Ok(None),
    }
}
