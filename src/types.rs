// src/types.rs
//
// Settings tree and shared drawing constants.
//
// The Config sections follow the command line groups: file locations,
// detection knobs, identity matching knobs, output toggles, display
// behavior, and logging. Defaults here are the tool's working defaults;
// a YAML settings file replaces sections wholesale and individual command
// line flags win over both.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::tracker::TrackerConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub files: FilesConfig,
    pub detection: DetectionConfig,
    pub matching: MatchingConfig,
    pub output: OutputConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Video source directory searched for relative file names.
    pub input_dir: Option<PathBuf>,
    /// Directory for all file output. Unset means an "output" directory
    /// next to each video source.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Brightness floor for the binary threshold, 0-255.
    pub threshold: i32,
    /// Width of the frame border region blanked before detection, px.
    pub border: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Frames a droplet stays matchable after it was last seen.
    pub frame_history: u32,
    /// Shape similarity ceiling; smaller is more similar.
    pub droplet_similarity: u32,
    /// Centroid distance ceiling in pixels; greater overrides similarity.
    pub distance_threshold: u32,
    /// Apply manual identity corrections from <video>.corrections.
    pub apply_corrections: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write the droplet data file.
    pub csv: bool,
    /// Write the annotated video file.
    pub capture_video: bool,
    /// Output video frames written per source frame.
    pub output_frames: u32,
    /// Write image files for the ten frames with the most droplets.
    pub top_10: bool,
    /// Leave out earlier sighting outlines for relinked droplets.
    pub hide_droplet_history: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Wait for the keyboard between frames.
    pub interactive: bool,
    /// Keep the preview window closed while processing.
    pub hide_video: bool,
    /// Console progress output.
    pub verbose: bool,
    /// Debug output to the terminal.
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 62,
            border: 20,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            frame_history: 1,
            droplet_similarity: 30,
            distance_threshold: 40,
            apply_corrections: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv: true,
            capture_video: true,
            output_frames: 1,
            top_10: false,
            hide_droplet_history: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            interactive: true,
            hide_video: true, // preview stays closed unless --show-video
            verbose: true,
            debug: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Matching knobs in the shape the tracker wants.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            frames_before_deregister: self.matching.frame_history,
            confidence_threshold: self.matching.droplet_similarity as f64,
            distance_threshold: self.matching.distance_threshold as f64,
        }
    }
}

// ============================================================================
// DRAWING COLORS
// ============================================================================

// BGR colors for frame annotation.
pub const BRIGHT_RED: (f64, f64, f64) = (0.0, 0.0, 255.0);
pub const BRIGHT_GREEN: (f64, f64, f64) = (0.0, 255.0, 0.0);
pub const DARK_GREEN: (f64, f64, f64) = (0.0, 136.0, 0.0);
pub const AMBER: (f64, f64, f64) = (4.0, 152.0, 251.0);
pub const MEDIUM_GRAY: (f64, f64, f64) = (150.0, 150.0, 150.0);
pub const ORANGE: (f64, f64, f64) = (3.0, 125.0, 255.0);
