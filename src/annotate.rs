// src/annotate.rs
//
// Frame annotation: droplet highlights, label text, the frame header
// block and the keyboard prompt. Everything draws on a black annotation
// layer that gets composited onto the original frame with a saturating
// add, so black stays transparent.

use anyhow::Result;
use opencv::core::{self, Mat, Scalar, Vector};
use opencv::imgproc;
use opencv::prelude::*;

use crate::droplet::Droplet;
use crate::labeler::{Label, Labeler};
use crate::timecode::frames_to_timecode;
use crate::types::{AMBER, BRIGHT_GREEN, BRIGHT_RED, DARK_GREEN, MEDIUM_GRAY, ORANGE};

/// Pluralizing suffix for friendly messages.
pub fn ess(count: u64) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Amber outlines of every recorded sighting of a droplet, the visual
/// trail of where a relinked droplet has been.
pub fn draw_history_trails(frame: &mut Mat, droplet: &Droplet) -> Result<()> {
    let contours: Vector<Vector<core::Point>> = droplet
        .contour_history()
        .map(|contour| {
            contour
                .iter()
                .map(|p| core::Point::new(p.x, p.y))
                .collect()
        })
        .collect();
    imgproc::draw_contours(
        frame,
        &contours,
        -1,
        scalar(AMBER),
        1,
        imgproc::LINE_8,
        &core::no_array(),
        i32::MAX,
        core::Point::new(0, 0),
    )?;
    Ok(())
}

/// Red box around the current contour, two pixels off the geometry.
pub fn draw_contour_box(frame: &mut Mat, label: &Label) -> Result<()> {
    let (ul, lr) = label.contour_box();
    imgproc::rectangle(
        frame,
        core::Rect::new(ul.x, ul.y, lr.x - ul.x + 1, lr.y - ul.y + 1),
        scalar(BRIGHT_RED),
        1,
        imgproc::LINE_8,
        0,
    )?;
    Ok(())
}

/// Single red pixel at the droplet centroid. Only visible when a frame
/// is captured and magnified.
pub fn mark_centroid(frame: &mut Mat, centroid: (f64, f64)) -> Result<()> {
    let center = core::Point::new(centroid.0 as i32, centroid.1 as i32);
    imgproc::line(
        frame,
        center,
        center,
        scalar(BRIGHT_RED),
        1,
        imgproc::LINE_8,
        0,
    )?;
    Ok(())
}

/// Draw every placed label: the big droplet id, the pixel area, and the
/// initial id line when the droplet was relinked to an earlier one.
pub fn draw_labels(frame: &mut Mat, labeler: &Labeler) -> Result<()> {
    for label in labeler.labels() {
        let corner = match label.corner_used {
            Some(corner) => corner,
            None => continue,
        };
        let anchors = label.text_anchors(corner)?;
        put_line(frame, label.id_text(), anchors.id, 2.0, BRIGHT_GREEN)?;
        put_line(frame, label.area_text(), anchors.area, 1.0, DARK_GREEN)?;
        if let Some(initial) = anchors.initial {
            put_line(frame, label.initial_text(), initial, 1.0, AMBER)?;
        }
    }
    Ok(())
}

// ============================================================================
// FRAME HEADER
// ============================================================================

/// Everything the frame header reports about the video and the current
/// threshold settings.
pub struct HeaderStats<'a> {
    pub file_name: &'a str,
    pub counting_frame_number: u32,
    pub total_frame_count: usize,
    pub frame_droplet_count: usize,
    pub frame_pixel_area: u64,
    pub video_droplet_count: usize,
    pub raw_droplet_count: usize,
    pub video_pixel_area: u64,
    pub threshold: i32,
    pub frame_history: u32,
    pub similarity_threshold: u32,
    pub distance_threshold: u32,
}

/// Status block in the frame's upper left corner. Each line after the
/// first drops by its own height, plus the prior line's baseline.
pub fn draw_frame_header(frame: &mut Mat, stats: &HeaderStats) -> Result<()> {
    let x = 50;
    let mut y = 50;

    let (_, b) = header_metrics(stats.file_name, 2.0)?;
    put_line(frame, stats.file_name, (x, y), 2.0, DARK_GREEN)?;
    y += b;

    let line = format!(
        "Frame {} of {} ({})",
        stats.counting_frame_number,
        stats.total_frame_count,
        frames_to_timecode(stats.counting_frame_number - 1, 30),
    );
    let (h, b) = header_metrics(&line, 2.0)?;
    y += h;
    put_line(frame, &line, (x, y), 2.0, DARK_GREEN)?;
    y += b;

    let line = format!(
        "Frame: {} new droplet{}, {} pixel{}",
        stats.frame_droplet_count,
        ess(stats.frame_droplet_count as u64),
        stats.frame_pixel_area,
        ess(stats.frame_pixel_area),
    );
    let (h, b) = header_metrics(&line, 1.0)?;
    y += h;
    put_line(frame, &line, (x, y), 1.0, DARK_GREEN)?;
    y += b;

    let line = format!(
        "Total: {} unique droplet{}, {} pixel{} ({} raw droplet{})",
        stats.video_droplet_count,
        ess(stats.video_droplet_count as u64),
        stats.video_pixel_area,
        ess(stats.video_pixel_area),
        stats.raw_droplet_count,
        ess(stats.raw_droplet_count as u64),
    );
    let (h, b) = header_metrics(&line, 1.0)?;
    y += h;
    put_line(frame, &line, (x, y), 1.0, DARK_GREEN)?;
    y += b * 2;

    let line = format!("Brightness threshold: {}/255", stats.threshold);
    let (h, b) = header_metrics(&line, 1.0)?;
    y += h;
    put_line(frame, &line, (x, y), 1.0, DARK_GREEN)?;
    y += b;

    let line = format!(
        "Similarity threshold: {}, frame memory {}",
        stats.similarity_threshold, stats.frame_history,
    );
    let (h, b) = header_metrics(&line, 1.0)?;
    y += h;
    put_line(frame, &line, (x, y), 1.0, DARK_GREEN)?;
    y += b;

    let line = format!(
        "Distance threshold: less than or equal to {} pixels",
        stats.distance_threshold,
    );
    let (h, _) = header_metrics(&line, 1.0)?;
    y += h;
    put_line(frame, &line, (x, y), 1.0, DARK_GREEN)?;

    Ok(())
}

/// Keyboard help along the bottom edge, plus a notice when stepping
/// backward is off.
pub fn draw_ui_prompt(frame: &mut Mat, interactive: bool, back_disabled: bool) -> Result<()> {
    let prompt = if interactive {
        "esc or 'q' to quit, 'c' to capture this frame as a .png, 1-99 to advance more than one frame, any other key to advance one frame"
    } else {
        // The video is showing but won't pause after each frame, so all
        // they can do is quit.
        "esc or 'q' to quit"
    };
    put_line(frame, prompt, (50, 1050), 1.0, MEDIUM_GRAY)?;

    if back_disabled && interactive {
        put_line(
            frame,
            "Creating video file or .csv: going backwards is disabled.",
            (1400, 1050),
            1.0,
            ORANGE,
        )?;
    }
    Ok(())
}

/// Saturating add of the annotation layer onto the original frame. Black
/// annotation pixels leave the original untouched.
pub fn composite_onto(original: &Mat, annotations: &Mat) -> Result<Mat> {
    let mut combined = Mat::default();
    core::add(original, annotations, &mut combined, &core::no_array(), -1)?;
    Ok(combined)
}

fn scalar(color: (f64, f64, f64)) -> Scalar {
    Scalar::new(color.0, color.1, color.2, 0.0)
}

fn put_line(
    frame: &mut Mat,
    text: &str,
    origin: (i32, i32),
    scale: f64,
    color: (f64, f64, f64),
) -> Result<()> {
    imgproc::put_text(
        frame,
        text,
        core::Point::new(origin.0, origin.1),
        imgproc::FONT_HERSHEY_PLAIN,
        scale,
        scalar(color),
        1,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

fn header_metrics(text: &str, scale: f64) -> Result<(i32, i32)> {
    let mut baseline = 0;
    let size = imgproc::get_text_size(text, imgproc::FONT_HERSHEY_PLAIN, scale, 1, &mut baseline)?;
    Ok((size.height, baseline))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::HersheyTextSizer;
    use crate::geometry::Point;

    #[test]
    fn test_ess_pluralizes_everything_but_one() {
        assert_eq!(ess(0), "s");
        assert_eq!(ess(1), "");
        assert_eq!(ess(2), "s");
    }

    #[test]
    fn test_composite_leaves_black_alone_and_saturates() {
        let original =
            Mat::new_rows_cols_with_default(4, 4, core::CV_8UC3, Scalar::all(200.0)).unwrap();
        let mut annotations =
            Mat::new_rows_cols_with_default(4, 4, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        imgproc::line(
            &mut annotations,
            core::Point::new(1, 1),
            core::Point::new(1, 1),
            Scalar::all(100.0),
            1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let combined = composite_onto(&original, &annotations).unwrap();
        let marked: &core::Vec3b = combined.at_2d(1, 1).unwrap();
        let plain: &core::Vec3b = combined.at_2d(0, 0).unwrap();
        assert_eq!(marked[0], 255, "200 + 100 saturates");
        assert_eq!(plain[0], 200);
    }

    #[test]
    fn test_contour_box_is_red_and_stands_off() {
        let contour = vec![
            Point::new(20, 20),
            Point::new(29, 20),
            Point::new(29, 29),
            Point::new(20, 29),
        ];
        let droplet = Droplet::new(1, contour, 100, 0);
        let label = Label::new(&droplet, &HersheyTextSizer).unwrap();

        let mut frame =
            Mat::new_rows_cols_with_default(100, 100, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        draw_contour_box(&mut frame, &label).unwrap();

        let (ul, lr) = label.contour_box();
        assert_eq!((ul.x, ul.y, lr.x, lr.y), (18, 18, 32, 32));
        // at_2d is row, column.
        let corner: &core::Vec3b = frame.at_2d(18, 18).unwrap();
        let far_corner: &core::Vec3b = frame.at_2d(32, 32).unwrap();
        let inside: &core::Vec3b = frame.at_2d(25, 25).unwrap();
        assert_eq!(corner[2], 255, "box border is red");
        assert_eq!(far_corner[2], 255, "border passes through both corners");
        assert_eq!(inside[2], 0, "box is not filled");
    }
}
