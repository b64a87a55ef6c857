// src/timecode.rs
//
// Frame-count to SMPTE-style non-drop timecode for the frame header.

/// Render a frame count as `HH:MM:SS:FF` at the given frame rate.
/// Non-drop only.
pub fn frames_to_timecode(frame_count: u32, rate: u32) -> String {
    let frames_per_hour = rate * 60 * 60;
    let frames_per_minute = rate * 60;
    let hours = frame_count / frames_per_hour;
    let minutes = (frame_count / frames_per_minute) % 60;
    let seconds = (frame_count % frames_per_minute) / rate;
    let frames = (frame_count % frames_per_minute) % rate;

    format!("{:02}:{:02}:{:02}:{:02}", hours, minutes, seconds, frames)
}
