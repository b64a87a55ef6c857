// src/main.rs
//
// Droplet video analyzer. Each video gets two passes: a scan pass that
// catalogs every frame and raw droplet, then an interactive pass that
// resolves droplet identities across frames and produces the annotated
// display, the captured video file, and the droplet data file.

mod annotate;
mod catalog;
mod cli;
mod config;
mod corrections;
mod csv_export;
mod detection;
mod dispatcher;
mod dispenser;
mod display;
mod droplet;
mod frame;
mod geometry;
mod labeler;
mod output;
mod processor;
mod scanner;
mod timecode;
mod tracker;
mod types;

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use indexmap::IndexSet;
use opencv::core::{Size, Vector};
use opencv::imgcodecs;
use opencv::prelude::*;
use opencv::videoio::VideoWriter;
use tracing::warn;

use crate::cli::Args;
use crate::corrections::{CorrectionFileSettings, CorrectionMap};
use crate::csv_export::CsvFile;
use crate::dispatcher::{Action, Dispatcher};
use crate::display::DisplayParams;
use crate::output::InputFile;
use crate::processor::VideoFrameProcessor;
use crate::types::Config;

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve()?;

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .init();

    let input_dir = output::resolve_directory(config.files.input_dir.as_deref());
    let output_dir = output::resolve_directory(config.files.output_dir.as_deref());
    let video_files = output::unpack_input_files(
        &args.video_files,
        input_dir.as_deref(),
        output_dir.as_deref(),
    );

    for video_file in &video_files {
        analyze_video(video_file, &config)?;
    }

    Ok(())
}

fn analyze_video(input: &InputFile, config: &Config) -> Result<()> {
    let verbose = config.display.verbose;

    let output_files = output::set_up_output_filenames(&input.path, &input.output_dir)?;

    // Manual identity corrections for this video, if requested. The first
    // run writes a commented template next to the video source.
    let (droplet_corrections, correction_count) = if config.matching.apply_corrections {
        corrections::load_or_create(
            &output_files.corrections,
            &CorrectionFileSettings {
                video_file_name: output_files.video_file_name(),
                threshold: config.detection.threshold,
                frame_history: config.matching.frame_history,
                droplet_similarity: config.matching.droplet_similarity,
                distance_threshold: config.matching.distance_threshold,
            },
        )?
    } else {
        (CorrectionMap::new(), None)
    };

    // First pass: the master catalog of frames and raw droplets.
    let master = scanner::scan_video(
        &input.path,
        config.detection.threshold,
        config.detection.border,
        verbose,
    )?;

    let initial_scan_droplet_count: usize = master.droplet_counts_by_frame.iter().sum();

    let csv_file = if config.output.csv {
        Some(CsvFile::new(&master, output_files.csv.clone(), verbose))
    } else {
        None
    };

    // The ten busiest frames by raw droplet count get saved as images,
    // which is enough to judge a threshold without making a whole video.
    let top_10_frames = top_frames_by_droplet_count(&master.droplet_counts_by_frame, 10);

    let mut processor = VideoFrameProcessor::new(
        &input.path,
        output_files.image_capture.clone(),
        master,
        droplet_corrections,
        csv_file,
        config,
    )?;

    let (frame_width, frame_height) = processor.frame_shape();

    let mut video_output = if config.output.capture_video {
        // Picking an output codec in opencv is buggy. mpv4 draws a
        // complaint, then falls back to H.264 in an MP4 container and
        // writes a readable file, which is more than the honest FourCC
        // entries manage.
        let fourcc = VideoWriter::fourcc('m', 'p', 'v', '4')?;
        Some(VideoWriter::new(
            &output_files.video.to_string_lossy(),
            fourcc,
            f64::from(processor.frame_rate()),
            Size::new(frame_width, frame_height),
            true,
        )?)
    } else {
        None
    };

    let analysis_start = Instant::now();

    let dispatcher = Dispatcher::new(
        config.display.interactive,
        config.output.capture_video,
        config.output.top_10,
        config.output.csv,
    );

    let back_disabled = config.output.capture_video
        || config.output.csv
        || (config.output.top_10 && !config.display.hide_video);
    let mut params = DisplayParams {
        frames_to_advance: 1,
        back_disabled,
    };
    let mut action = Action::Next;

    //
    // Video frame loop.
    //

    loop {
        // The processor learns about the end of the file before we do.
        if processor.has_no_more_frames() {
            break;
        }

        let display_frame = match dispatcher.dispatch(action, &mut processor)? {
            Some(frame) => frame,
            None => break,
        };

        if config.output.top_10 && processor.index_frame_number >= 0 {
            let frame_index = processor.index_frame_number as usize;
            if top_10_frames.contains(&frame_index) {
                let path = output_files.top_10_frame(processor.counting_frame_number);
                if !imgcodecs::imwrite(&path.to_string_lossy(), &display_frame, &Vector::new())? {
                    warn!("couldn't write top 10 image {}", path.display());
                }
            }
        }

        if let Some(writer) = video_output.as_mut() {
            for _ in 0..config.output.output_frames {
                writer.write(&display_frame)?;
            }
        }

        if !config.display.hide_video {
            action = display::manage_display_and_keyboard(
                &display_frame,
                config.display.interactive,
                processor.counting_frame_number,
                processor.file_length_in_frames(),
                &mut params,
            )?;
        }
    }

    // Brags.

    if (!config.display.interactive || config.output.capture_video) && verbose {
        // Frame rate only means something without keyboard pauses.
        let fps =
            f64::from(processor.counting_frame_number) / analysis_start.elapsed().as_secs_f64();
        println!(
            "\n\n2nd pass: {} frames,\nprocessed at {:2.1} frames per second.",
            processor.counting_frame_number, fps
        );
        println!(
            "\n{} droplets found in initial scan of video file\n{} unique droplets after duplicate discovery",
            initial_scan_droplet_count,
            processor.video_droplet_count()
        );
    }

    if let Some(count) = correction_count {
        if count > 0 && verbose && processor.video_droplet_count() > 0 {
            let error_rate = count as f64 / processor.video_droplet_count() as f64 * 100.0;
            println!(
                "\n{} corrections made by hand (error rate {:.2}%, {:.2}% correct)",
                count,
                error_rate,
                100.0 - error_rate
            );
        }
    }

    // Clean-up.

    if let Some(csv_file) = processor.take_csv_file() {
        csv_file.write()?;
    }

    if let Some(mut writer) = video_output {
        writer.release()?;
    }

    Ok(())
}

/// Frame indexes of the `count` frames with the most raw droplets, ties
/// going to the earlier frame.
fn top_frames_by_droplet_count(counts_by_frame: &[usize], count: usize) -> IndexSet<usize> {
    let mut ranked: Vec<(usize, usize)> = counts_by_frame.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(count)
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_frames_ranked_by_count() {
        let counts = vec![3, 9, 1, 7, 0];
        let top = top_frames_by_droplet_count(&counts, 2);
        assert!(top.contains(&1) && top.contains(&3), "frames 1 and 3 lead");
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn test_top_frames_ties_go_to_the_earlier_frame() {
        let counts = vec![5, 8, 8, 8];
        let top = top_frames_by_droplet_count(&counts, 2);
        assert!(top.contains(&1) && top.contains(&2), "earlier of the 8s win");
        assert!(!top.contains(&3));
    }

    #[test]
    fn test_top_frames_short_video() {
        let counts = vec![2, 4];
        let top = top_frames_by_droplet_count(&counts, 10);
        assert_eq!(top.len(), 2, "no padding past the real frames");
    }
}
