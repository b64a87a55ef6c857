// src/output.rs
//
// Input file resolution and output file naming. Video file arguments
// may be absolute paths, names relative to the input directory, or
// wildcard patterns; anything that doesn't resolve to a real file is
// silently dropped so a run over several patterns tolerates empty ones.
// Output names carry a datestamp down to the second because restarting
// inside the same minute would otherwise collide.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use indexmap::IndexSet;

#[derive(Debug, Clone)]
pub struct InputFile {
    pub path: PathBuf,
    pub output_dir: PathBuf,
}

/// Turn the command line file arguments into real video files, each
/// paired with the directory its output lands in. That's the supplied
/// output directory, or an "output" directory next to the video.
pub fn unpack_input_files(
    candidates: &[String],
    input_dir: Option<&Path>,
    output_dir: Option<&Path>,
) -> Vec<InputFile> {
    let mut resolved: IndexSet<PathBuf> = IndexSet::new();

    for candidate in candidates {
        let expanded = PathBuf::from(shellexpand::tilde(candidate).into_owned());
        if expanded.is_file() {
            resolved.insert(expanded);
            continue;
        }

        let search_root = match input_dir {
            Some(dir) => dir.to_path_buf(),
            None => env::current_dir().unwrap_or_default(),
        };
        let pattern = search_root.join(&expanded);
        if let Ok(matches) = glob::glob(&pattern.to_string_lossy()) {
            for path in matches.flatten() {
                if path.is_file() {
                    resolved.insert(path);
                }
            }
        }
    }

    resolved
        .into_iter()
        .map(|path| {
            let output_dir = match output_dir {
                Some(dir) => dir.to_path_buf(),
                None => path
                    .parent()
                    .unwrap_or_else(|| Path::new(""))
                    .join("output"),
            };
            InputFile { path, output_dir }
        })
        .collect()
}

/// Absolute form of a user-supplied directory, or None when it doesn't
/// exist.
pub fn resolve_directory(dir: Option<&Path>) -> Option<PathBuf> {
    let dir = dir?;
    let expanded = PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).into_owned());
    let absolute = std::path::absolute(&expanded).ok()?;
    if absolute.is_dir() {
        Some(absolute)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct OutputFiles {
    pub video: PathBuf,
    pub csv: PathBuf,
    pub image_capture: PathBuf,
    pub corrections: PathBuf,
    output_dir: PathBuf,
    file_root: String,
}

impl OutputFiles {
    /// Image file for one of the ten busiest frames.
    pub fn top_10_frame(&self, frame_number: u32) -> PathBuf {
        self.output_dir
            .join(format!("{}_top_10_frame_{}.png", self.file_root, frame_number))
    }

    /// Bare name of the annotated video file, echoed into the corrections
    /// template.
    pub fn video_file_name(&self) -> String {
        self.video
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Build all the output paths for one video and make sure the output
/// directory exists. The corrections file sits next to the video
/// source, where it survives output cleanups. Image captures aren't
/// datestamped; the capture code numbers them instead, so they carry
/// over between runs without being overwritten.
pub fn set_up_output_filenames(video_path: &Path, output_dir: &Path) -> Result<OutputFiles> {
    let output_dir = PathBuf::from(shellexpand::tilde(&output_dir.to_string_lossy()).into_owned());
    if !output_dir.exists() {
        fs::create_dir(&output_dir)
            .with_context(|| format!("can't create output directory {}", output_dir.display()))?;
    }

    let video_dir = video_path.parent().unwrap_or_else(|| Path::new(""));
    let file_root = video_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = video_path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let date_string = Local::now()
        .format("%d%b%Y_%H%M_%S")
        .to_string()
        .to_uppercase();

    let video = output_dir.join(format!("{}_annotated_{}{}", file_root, date_string, extension));
    let csv = output_dir.join(format!("{}_data_{}.csv", file_root, date_string));
    let image_capture = output_dir.join(format!("{}_image_capture_1.png", file_root));
    let corrections = video_dir.join(format!("{}.corrections", file_root));

    // Nearly impossible, but opencv's VideoWriter dies rather than
    // overwrite a file.
    if video.exists() {
        bail!(
            "{} already exists; you started twice within a second",
            video.display()
        );
    }

    Ok(OutputFiles {
        video,
        csv,
        image_capture,
        corrections,
        output_dir,
        file_root,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_unpack_resolves_wildcards_and_drops_misses() {
        let dir = tempfile::tempdir().expect("temp dir");
        File::create(dir.path().join("a.mov")).expect("a.mov");
        File::create(dir.path().join("b.mov")).expect("b.mov");
        File::create(dir.path().join("notes.txt")).expect("notes.txt");

        let candidates = vec!["*.mov".to_string(), "missing_*.avi".to_string()];
        let files = unpack_input_files(&candidates, Some(dir.path()), None);

        assert_eq!(files.len(), 2, "both .mov files and nothing else");
        for file in &files {
            assert_eq!(
                file.output_dir,
                dir.path().join("output"),
                "default output dir sits next to the video"
            );
        }
    }

    #[test]
    fn test_unpack_deduplicates_repeat_mentions() {
        let dir = tempfile::tempdir().expect("temp dir");
        let video = dir.path().join("clip.mov");
        File::create(&video).expect("clip.mov");

        let candidates = vec![
            video.to_string_lossy().into_owned(),
            "clip.mov".to_string(),
            "*.mov".to_string(),
        ];
        let files = unpack_input_files(&candidates, Some(dir.path()), None);

        assert_eq!(files.len(), 1, "one video however many ways it's named");
    }

    #[test]
    fn test_unpack_honors_supplied_output_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let out = tempfile::tempdir().expect("output dir");
        File::create(dir.path().join("clip.mov")).expect("clip.mov");

        let files = unpack_input_files(
            &["clip.mov".to_string()],
            Some(dir.path()),
            Some(out.path()),
        );

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].output_dir, out.path());
    }

    #[test]
    fn test_resolve_directory() {
        let dir = tempfile::tempdir().expect("temp dir");

        assert_eq!(
            resolve_directory(Some(dir.path())),
            Some(dir.path().to_path_buf())
        );
        assert_eq!(resolve_directory(Some(Path::new("/no/such/place"))), None);
        assert_eq!(resolve_directory(None), None);
    }

    #[test]
    fn test_output_filenames() {
        let dir = tempfile::tempdir().expect("temp dir");
        let video = dir.path().join("sneeze.mov");
        File::create(&video).expect("sneeze.mov");
        let out = dir.path().join("out");

        let files = set_up_output_filenames(&video, &out).expect("output files");

        assert!(out.is_dir(), "output directory should be created");

        let video_name = files.video.file_name().expect("name").to_string_lossy();
        assert!(video_name.starts_with("sneeze_annotated_"));
        assert!(video_name.ends_with(".mov"));

        let csv_name = files.csv.file_name().expect("name").to_string_lossy();
        assert!(csv_name.starts_with("sneeze_data_"));
        assert!(csv_name.ends_with(".csv"));

        assert_eq!(files.image_capture, out.join("sneeze_image_capture_1.png"));
        assert_eq!(
            files.corrections,
            dir.path().join("sneeze.corrections"),
            "corrections live next to the video source"
        );
        assert_eq!(files.top_10_frame(12), out.join("sneeze_top_10_frame_12.png"));
    }
}
