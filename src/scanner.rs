// src/scanner.rs
//
// Initial full-file scan. Spins through every frame without interruption
// and builds the master catalog of frames and droplets for the whole
// video.
//
// The scan began life as a way to get an exact frame count, since the
// capture's frame count property is only an estimate. Collecting the rest
// of the droplet data on the same pass was barely slower, and having it
// all assembled up front is what lets the second pass resolve duplicates
// and the viewer step around freely. Only metadata is kept; frame pixels
// are not.

use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::Result;

use crate::catalog::VideoCatalog;
use crate::detection::{self, AreaMeasure};
use crate::dispenser::{FrameDispenser, DEFAULT_HISTORY_SIZE};

/// Scan the whole file and return the populated catalog. Droplet ids
/// restart at 1 with the fresh catalog, so a rescan renumbers everything.
pub fn scan_video(
    path: &Path,
    threshold: i32,
    border_width: i32,
    verbose: bool,
) -> Result<VideoCatalog> {
    let scan_start = Instant::now();
    let mut catalog = VideoCatalog::new();
    let mut progress = ProgressDots::new(verbose);

    if verbose {
        println!("\nInitial scan of {}\n", path.display());
    }

    let mut dispenser = FrameDispenser::open(path, DEFAULT_HISTORY_SIZE, false)?;
    let (width, height) = dispenser.shape();
    let mut gauge = AreaMeasure::new(height, width)?;

    while let Some(frame) = dispenser.next()? {
        let index = dispenser.index_frame_number as usize;
        catalog.add_frame(index);
        progress.tick(index);

        let (contours, mut thresholded) =
            detection::threshold_and_find_droplets(&frame, threshold, border_width)?;
        catalog.droplet_counts_by_frame.push(contours.len());

        for contour in contours.iter() {
            // Flood fill wants a lit seed pixel; the contour's first point
            // qualifies.
            let seed = contour.get(0)?;
            let area = gauge.droplet_area(&mut thresholded, seed)?;
            catalog.add_droplet(index, detection::contour_points(&contour), area);
        }
    }

    let frames_counted = dispenser.counting_frame_number;
    let fps = frames_counted as f64 / scan_start.elapsed().as_secs_f64();

    if verbose {
        let droplets_counted: usize = catalog.droplet_counts_by_frame.iter().sum();
        println!(
            "\n\nCounted {} frames and {} droplets,\nprocessed at {:2.0} frames per second.\n",
            frames_counted, droplets_counted, fps
        );
    }

    Ok(catalog)
}

/// One dot per second of video, thirty dots per console line.
struct ProgressDots {
    verbose: bool,
    second_count: u32,
}

impl ProgressDots {
    fn new(verbose: bool) -> Self {
        Self {
            verbose,
            second_count: 0,
        }
    }

    fn tick(&mut self, frame_index: usize) {
        if frame_index % 30 == 0 {
            self.second_count += 1;
            if self.verbose {
                print!(".");
                let _ = io::stdout().flush();
            }
            if self.second_count % 30 == 0 && self.verbose {
                println!();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_ticks_once_per_thirty_frames() {
        let mut progress = ProgressDots::new(false);
        for frame_index in 0..=90 {
            progress.tick(frame_index);
        }
        assert_eq!(progress.second_count, 4, "frames 0, 30, 60 and 90");
    }
}
