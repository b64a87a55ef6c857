// src/display.rs
//
// Preview window and its peculiar keyboard protocol. The prompt is
// drawn on a copy of the frame so captured files stay clean. A digit
// keypress starts an auto-advance run; a second digit within half a
// second makes it a two-digit count.

use anyhow::Result;
use opencv::core::Mat;
use opencv::highgui;
use opencv::prelude::*;

use crate::annotate;
use crate::dispatcher::Action;

pub struct DisplayParams {
    pub frames_to_advance: u32,
    pub back_disabled: bool,
}

/// Show one processed frame and translate the keyboard into the next
/// action.
///
/// Keys: esc or q quits, 0-9 once or twice advances that many frames,
/// c captures an image, + and - nudge the brightness threshold, comma
/// steps back. Anything else advances one frame.
pub fn manage_display_and_keyboard(
    display_frame: &Mat,
    interactive: bool,
    counting_frame_number: u32,
    total_frame_count: usize,
    params: &mut DisplayParams,
) -> Result<Action> {
    let mut shown = display_frame.try_clone()?;
    annotate::draw_ui_prompt(&mut shown, interactive, params.back_disabled)?;

    highgui::start_window_thread()?;
    let title = format!("Frame {} of {}", counting_frame_number, total_frame_count);
    highgui::imshow(&title, &shown)?;

    if params.frames_to_advance > 1 {
        // Mid auto-advance run; flash the frame and keep going.
        params.frames_to_advance -= 1;
        highgui::wait_key(1)?;
        highgui::destroy_all_windows()?;
        return Ok(Action::Next);
    }

    if !interactive {
        // Wait just long enough, 100msec, to allow quitting.
        let key = highgui::wait_key(100)? & 0xff;
        highgui::destroy_all_windows()?;
        if key == i32::from(b'q') || key == 27 {
            return Ok(Action::Stop);
        }
        return Ok(Action::Next);
    }

    let key = highgui::wait_key(0)? & 0xff;

    let action = if key == i32::from(b'q') || key == 27 {
        Action::Stop
    } else if (48..=57).contains(&key) {
        let first_digit = (key - 48) as u32;
        params.frames_to_advance = first_digit;
        let second = highgui::wait_key(500)?;
        if second != -1 && (48..=57).contains(&second) {
            // Two digits typed quickly make a two-digit count. A digit
            // followed by a letter stays a one-digit count.
            params.frames_to_advance = first_digit * 10 + (second - 48) as u32;
        }
        Action::Next
    } else if key == i32::from(b'c') {
        Action::Capture
    } else if key == i32::from(b'+') || key == i32::from(b'=') {
        Action::ThresholdUp
    } else if key == i32::from(b'-') || key == i32::from(b'_') {
        Action::ThresholdDown
    } else if key == i32::from(b',') || key == 2 {
        // Left arrow comes through as 2 on some systems.
        Action::Back
    } else {
        Action::Next
    };

    highgui::destroy_all_windows()?;
    Ok(action)
}
