// src/processor.rs
//
// Second video pass: serves annotated frames one at a time and carries
// the interactive controls. Frames come from the dispenser, detections
// from the master catalog, identity resolution from the tracker; this
// module glues them together, keeps the running counters the frame
// header reports, and feeds the CSV rows.
//
// Design:
// - The catalog is rebuilt with a fresh scan when the operator changes
//   the brightness threshold, and the tracker starts over with it. The
//   rescan is deferred until the next frame request so repeated +/-
//   keystrokes only pay for one scan.
// - After a rescan the processor reworks the frame it already has
//   instead of advancing, so the operator sees the effect in place.
// - Pixel areas accumulate for every sighting; droplet counts only for
//   sightings that aren't relinked duplicates, and video totals skip
//   reprocessing passes so a threshold experiment doesn't inflate them.

use std::path::{Path, PathBuf};

use anyhow::Result;
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;
use regex::Regex;
use tracing::{info, warn};

use crate::annotate::{self, ess, HeaderStats};
use crate::catalog::VideoCatalog;
use crate::corrections::CorrectionMap;
use crate::csv_export::CsvFile;
use crate::detection::{self, HersheyTextSizer, MatchShapesComparator};
use crate::dispenser::{FrameDispenser, DEFAULT_HISTORY_SIZE};
use crate::labeler::Labeler;
use crate::scanner;
use crate::tracker::Tracker;
use crate::types::Config;

pub struct VideoFrameProcessor {
    dispenser: FrameDispenser,
    master: VideoCatalog,
    tracker: Tracker,
    csv_file: Option<CsvFile>,

    file_path: PathBuf,
    file_name: String,
    image_capture_path: PathBuf,

    pub index_frame_number: i32,
    pub counting_frame_number: u32,

    frame_droplet_count: usize,
    video_total_droplet_count: usize,
    video_total_unprocessed_droplet_count: usize,
    frame_pixel_area: u64,
    video_total_pixel_area: u64,

    border_width: i32,
    image_threshold: i32,
    threshold_increment: i32,
    file_rescan_needed: bool,
    reprocessing: bool,
    similarity_threshold: u32,
    history: u32,
    distance_threshold: u32,

    file_length_in_frames: usize,
    hide_droplet_history: bool,
    verbose: bool,

    frame: Option<Mat>,
    processed_frame: Option<Mat>,
    frame_shape: (i32, i32),
}

impl VideoFrameProcessor {
    pub fn new(
        file_path: &Path,
        image_capture_path: PathBuf,
        master: VideoCatalog,
        corrections: CorrectionMap,
        csv_file: Option<CsvFile>,
        config: &Config,
    ) -> Result<Self> {
        let dispenser = FrameDispenser::open(file_path, DEFAULT_HISTORY_SIZE, true)?;
        let frame_shape = dispenser.shape();
        let tracker = Tracker::new(
            config.tracker_config(),
            corrections,
            Box::new(MatchShapesComparator),
        );
        let file_length_in_frames = master.frame_count();
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            dispenser,
            master,
            tracker,
            csv_file,
            file_path: file_path.to_path_buf(),
            file_name,
            image_capture_path,
            index_frame_number: -1,
            counting_frame_number: 0,
            frame_droplet_count: 0,
            video_total_droplet_count: 0,
            video_total_unprocessed_droplet_count: 0,
            frame_pixel_area: 0,
            video_total_pixel_area: 0,
            border_width: config.detection.border,
            image_threshold: config.detection.threshold,
            threshold_increment: 2,
            file_rescan_needed: false,
            reprocessing: false,
            similarity_threshold: config.matching.droplet_similarity,
            history: config.matching.frame_history,
            distance_threshold: config.matching.distance_threshold,
            file_length_in_frames,
            hide_droplet_history: config.output.hide_droplet_history,
            verbose: config.display.verbose,
            frame: None,
            processed_frame: None,
            frame_shape,
        })
    }

    pub fn frame_shape(&self) -> (i32, i32) {
        self.frame_shape
    }

    pub fn frame_rate(&self) -> u32 {
        self.dispenser.frame_rate()
    }

    pub fn file_length_in_frames(&self) -> usize {
        self.file_length_in_frames
    }

    pub fn video_droplet_count(&self) -> usize {
        self.video_total_droplet_count
    }

    pub fn has_no_more_frames(&self) -> bool {
        self.dispenser.is_empty()
    }

    /// Hand the CSV file back for writing once processing is over.
    pub fn take_csv_file(&mut self) -> Option<CsvFile> {
        self.csv_file.take()
    }

    /// Advance and process one frame, or replay a processed frame when
    /// stepping forward through history. None at end of file.
    pub fn next_frame(&mut self) -> Result<Option<Mat>> {
        self.rescan_check()?;
        if self.reprocessing {
            // Coming back from a threshold change: rework the frame we
            // already have instead of advancing.
        } else {
            self.frame = self.dispenser.next()?;
            if self.dispenser.is_empty() {
                return Ok(None);
            }
            self.index_frame_number = self.dispenser.index_frame_number;
            self.counting_frame_number = self.dispenser.counting_frame_number;
        }
        if self.dispenser.in_history {
            // Already processed on the way forward; serve it as is.
            clone_frame(&self.frame)
        } else {
            let frame = match &self.frame {
                Some(frame) => frame.try_clone()?,
                None => return Ok(None),
            };
            Ok(Some(self.process(&frame)?))
        }
    }

    /// Step one frame back. The dispenser serves the shelved processed
    /// frame; at the history limit it re-serves the current one.
    pub fn previous_frame(&mut self) -> Result<Option<Mat>> {
        self.rescan_check()?;
        if !self.reprocessing {
            self.frame = self.dispenser.previous()?;
            self.index_frame_number = self.dispenser.index_frame_number;
            self.counting_frame_number = self.dispenser.counting_frame_number;
        }
        clone_frame(&self.frame)
    }

    /// Rework the current raw frame, typically right after a threshold
    /// nudge.
    pub fn reprocess_last_frame(&mut self) -> Result<Option<Mat>> {
        let frame = match &self.frame {
            Some(frame) => frame.try_clone()?,
            None => return Ok(None),
        };
        Ok(Some(self.process(&frame)?))
    }

    /// Save the current processed frame as a numbered .png that never
    /// overwrites an earlier capture.
    pub fn capture_current_frame(&mut self) -> Result<Option<Mat>> {
        let renumber = Regex::new(r"_\d+\.png")?;
        let mut next_count = 1;
        while self.image_capture_path.exists() {
            let text = self.image_capture_path.to_string_lossy().into_owned();
            let renamed = renumber.replace(&text, format!("_{}.png", next_count).as_str());
            self.image_capture_path = PathBuf::from(renamed.into_owned());
            next_count += 1;
        }

        if let Some(processed) = &self.processed_frame {
            let path_text = self.image_capture_path.to_string_lossy();
            if !imgcodecs::imwrite(&path_text, processed, &Vector::new())? {
                warn!("couldn't write image capture {}", path_text);
            }
        }
        clone_frame(&self.processed_frame)
    }

    pub fn image_threshold_up(&mut self) {
        self.image_threshold += self.threshold_increment;
        self.file_rescan_needed = true;
    }

    pub fn image_threshold_down(&mut self) {
        self.image_threshold -= self.threshold_increment;
        self.file_rescan_needed = true;
    }

    /// Deferred threshold change: rebuild the catalog with a fresh scan
    /// and start the tracker over, then rework the current frame.
    fn rescan_check(&mut self) -> Result<()> {
        if self.file_rescan_needed {
            self.master = scanner::scan_video(
                &self.file_path,
                self.image_threshold,
                self.border_width,
                self.verbose,
            )?;
            self.file_length_in_frames = self.master.frame_count();
            self.tracker.reset();
            self.file_rescan_needed = false;
            self.reprocessing = true;
        }
        Ok(())
    }

    /// Run one raw frame through tracking and annotation. Returns the
    /// finished frame and shelves a copy for history traversal.
    fn process(&mut self, frame: &Mat) -> Result<Mat> {
        let frame_index = self.index_frame_number.max(0) as usize;

        let droplet_ids: Vec<u32> = self.master.frame_droplet_ids(frame_index).to_vec();
        self.video_total_unprocessed_droplet_count += droplet_ids.len();

        // The annotation layer starts from the thresholded frame so the
        // operator can see exactly what detection saw.
        let thresholded =
            detection::threshold_frame(frame, self.image_threshold, self.border_width)?;

        let areas: Vec<u32> = droplet_ids
            .iter()
            .filter_map(|id| self.master.droplet(*id))
            .map(|droplet| droplet.area())
            .collect();
        let area_sum: u64 = areas.iter().map(|a| u64::from(*a)).sum();
        let areas_string = if areas.is_empty() {
            String::new()
        } else {
            let listed: Vec<String> = areas.iter().map(|a| a.to_string()).collect();
            format!("({})", listed.join(" "))
        };
        info!(
            "----- Frame {}: {} raw droplet{}, {} pixel{} {} ---------------",
            self.index_frame_number + 1,
            droplet_ids.len(),
            ess(droplet_ids.len() as u64),
            area_sum,
            ess(area_sum),
            areas_string,
        );

        // All the droplets go out; some don't come back under their own
        // id.
        let winnowed = self
            .tracker
            .update(&mut self.master, &droplet_ids, frame_index)?;

        let mut annotations = Mat::default();
        imgproc::cvt_color(&thresholded, &mut annotations, imgproc::COLOR_GRAY2BGR, 0)?;

        self.frame_droplet_count = 0;
        self.frame_pixel_area = 0;

        let sizer = HersheyTextSizer;
        let mut labeler = Labeler::new(frame_index, self.frame_shape);

        for droplet_id in winnowed {
            // Relinked, if the id isn't one this frame's scan produced.
            let relinked = !self
                .master
                .frame_droplet_ids(frame_index)
                .contains(&droplet_id);

            let droplet = match self.master.droplet(droplet_id) {
                Some(droplet) => droplet,
                None => continue,
            };

            labeler.add_label(droplet, &sizer)?;

            if !relinked {
                self.frame_droplet_count += 1;
                if !self.reprocessing {
                    self.video_total_droplet_count += 1;
                }
            }

            if !self.hide_droplet_history && droplet.generations() >= 2 {
                annotate::draw_history_trails(&mut annotations, droplet)?;
            }

            let area = droplet.area();
            let initial_id = droplet.initial_id();
            let centroid = droplet.centroid();

            if let Some(label) = labeler.label(droplet_id) {
                annotate::draw_contour_box(&mut annotations, label)?;
            }
            annotate::mark_centroid(&mut annotations, centroid)?;

            self.frame_pixel_area += u64::from(area);
            self.video_total_pixel_area += u64::from(area);

            if let Some(csv_file) = self.csv_file.as_mut() {
                csv_file.update_row(
                    self.counting_frame_number as usize,
                    initial_id,
                    droplet_id,
                    area,
                    centroid,
                );
            }
        }

        labeler.place_labels();
        annotate::draw_labels(&mut annotations, &labeler)?;

        let stats = HeaderStats {
            file_name: &self.file_name,
            counting_frame_number: self.counting_frame_number,
            total_frame_count: self.file_length_in_frames,
            frame_droplet_count: self.frame_droplet_count,
            frame_pixel_area: self.frame_pixel_area,
            video_droplet_count: self.video_total_droplet_count,
            raw_droplet_count: self.video_total_unprocessed_droplet_count,
            video_pixel_area: self.video_total_pixel_area,
            threshold: self.image_threshold,
            frame_history: self.history,
            similarity_threshold: self.similarity_threshold,
            distance_threshold: self.distance_threshold,
        };
        annotate::draw_frame_header(&mut annotations, &stats)?;

        let composited = annotate::composite_onto(frame, &annotations)?;
        self.processed_frame = Some(composited.try_clone()?);
        self.dispenser.processed_frame_return(composited.try_clone()?);

        if self.reprocessing {
            self.reprocessing = false;
        }
        Ok(composited)
    }
}

fn clone_frame(frame: &Option<Mat>) -> Result<Option<Mat>> {
    match frame {
        Some(frame) => Ok(Some(frame.try_clone()?)),
        None => Ok(None),
    }
}
