// src/cli.rs
//
// Command line surface.
//
// Console output, the data file, and annotated video all default ON, so
// several switches are negative toggles that turn a default off. Value
// flags are optional here and folded over the defaults (and any YAML
// settings file) in resolve(), so an unset flag never clobbers a
// configured value.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::types::Config;

#[derive(Parser, Debug)]
#[command(
    name = "droplet-video-analyzer",
    about = "Counts and tracks droplets in sneeze videos",
    version
)]
pub struct Args {
    /// Video files to analyze, absolute or relative paths.
    #[arg(short = 'f', long = "file", value_name = "FILE", num_args = 1.., required = true)]
    pub video_files: Vec<String>,

    /// Directory for all file output; default creates "output" next to
    /// each video source.
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Video source directory searched for relative file names.
    #[arg(short = 'i', long, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Optional YAML settings file; flags given here still win.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Droplet detection threshold.
    #[arg(short = 't', long, value_name = "N")]
    pub threshold: Option<i32>,

    /// Width of the frame border region to ignore, in pixels.
    #[arg(short = 'b', long, value_name = "PX")]
    pub border: Option<i32>,

    /// Centroid distance threshold; greater than this overrides similarity.
    #[arg(long, value_name = "PX")]
    pub distance_threshold: Option<u32>,

    /// Droplet similarity threshold; smaller is more similar.
    #[arg(long, value_name = "N")]
    pub droplet_similarity: Option<u32>,

    /// Number of prior frames to consider for droplet identity.
    #[arg(long, value_name = "N")]
    pub frame_history: Option<u32>,

    /// Write image files for the ten frames with the most droplets.
    #[arg(long = "top-10")]
    pub top_10: bool,

    /// Don't create a .csv data file.
    #[arg(long = "no-csv")]
    pub no_csv: bool,

    /// Don't create an annotated video file.
    #[arg(short = 'c', long = "no-video-output")]
    pub no_video_output: bool,

    /// Suppress console window output.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Show the video preview while processing.
    #[arg(long)]
    pub show_video: bool,

    /// Don't wait for the keyboard to advance to the next frame.
    #[arg(short = 'n', long = "not-interactive")]
    pub not_interactive: bool,

    /// Apply droplet corrections from <video>.corrections.
    #[arg(long)]
    pub apply_corrections: bool,

    /// Hide earlier sighting outlines for relinked droplets.
    #[arg(long)]
    pub hide_droplet_history: bool,

    /// Number of output frames to write for each source frame.
    #[arg(long, value_name = "N")]
    pub output_frames: Option<u32>,

    /// Print debug output to the terminal.
    #[arg(short = 'd', long)]
    pub debug: bool,
}

impl Args {
    /// Fold the command line over the defaults and any settings file.
    pub fn resolve(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(dir) = &self.input_dir {
            config.files.input_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.files.output_dir = Some(dir.clone());
        }
        if let Some(threshold) = self.threshold {
            config.detection.threshold = threshold;
        }
        if let Some(border) = self.border {
            config.detection.border = border;
        }
        if let Some(distance) = self.distance_threshold {
            config.matching.distance_threshold = distance;
        }
        if let Some(similarity) = self.droplet_similarity {
            config.matching.droplet_similarity = similarity;
        }
        if let Some(history) = self.frame_history {
            config.matching.frame_history = history;
        }
        if let Some(frames) = self.output_frames {
            config.output.output_frames = frames;
        }

        if self.top_10 {
            config.output.top_10 = true;
        }
        if self.no_csv {
            config.output.csv = false;
        }
        if self.no_video_output {
            config.output.capture_video = false;
        }
        if self.hide_droplet_history {
            config.output.hide_droplet_history = true;
        }
        if self.apply_corrections {
            config.matching.apply_corrections = true;
        }
        if self.show_video {
            config.display.hide_video = false;
        }
        if self.not_interactive {
            config.display.interactive = false;
        }
        if self.quiet {
            config.display.verbose = false;
            config.logging.level = "warn".to_string();
        }
        if self.debug {
            // Debug wins over quiet for log output.
            config.display.debug = true;
            config.logging.level = "debug".to_string();
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).expect("argv should parse")
    }

    #[test]
    fn test_command_line_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults_flow_through() {
        let config = parse(&["dva", "-f", "a.mp4"]).resolve().unwrap();
        assert_eq!(config.detection.threshold, 62);
        assert_eq!(config.detection.border, 20);
        assert_eq!(config.matching.frame_history, 1);
        assert!(config.output.csv);
        assert!(config.output.capture_video);
        assert!(config.display.interactive);
        assert!(config.display.hide_video);
        assert!(config.display.verbose);
    }

    #[test]
    fn test_multiple_files() {
        let args = parse(&["dva", "-f", "a.mp4", "b.mp4", "c.mp4"]);
        assert_eq!(args.video_files, vec!["a.mp4", "b.mp4", "c.mp4"]);
    }

    #[test]
    fn test_negative_toggles_turn_defaults_off() {
        let config = parse(&[
            "dva",
            "-f",
            "a.mp4",
            "--no-csv",
            "--no-video-output",
            "--quiet",
            "--show-video",
            "--not-interactive",
        ])
        .resolve()
        .unwrap();

        assert!(!config.output.csv);
        assert!(!config.output.capture_video);
        assert!(!config.display.verbose);
        assert!(!config.display.hide_video);
        assert!(!config.display.interactive);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_value_flags_override_defaults() {
        let config = parse(&[
            "dva",
            "-f",
            "a.mp4",
            "-t",
            "70",
            "-b",
            "10",
            "--frame-history",
            "3",
            "--droplet-similarity",
            "25",
            "--distance-threshold",
            "55",
            "--output-frames",
            "4",
        ])
        .resolve()
        .unwrap();

        assert_eq!(config.detection.threshold, 70);
        assert_eq!(config.detection.border, 10);
        assert_eq!(config.matching.frame_history, 3);
        assert_eq!(config.matching.droplet_similarity, 25);
        assert_eq!(config.matching.distance_threshold, 55);
        assert_eq!(config.output.output_frames, 4);
    }

    #[test]
    fn test_debug_wins_over_quiet_for_logging() {
        let config = parse(&["dva", "-f", "a.mp4", "-q", "-d"]).resolve().unwrap();
        assert!(!config.display.verbose);
        assert!(config.display.debug);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_flag_is_an_error() {
        assert!(Args::try_parse_from(["dva", "-t", "70"]).is_err());
    }
}
