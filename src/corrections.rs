// src/corrections.rs
//
// Operator corrections for droplet identity decisions. The corrections
// file lives next to the video file and is plain text: one droplet id per
// line to suppress an automatic match, or two ids to force (or redirect)
// a connection to a specific predecessor. On the first run a commented
// template is written out with the active analysis settings, so by the
// time anyone edits it the format instructions are already in the file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use regex::Regex;
use tracing::warn;

/// One correction, keyed by the droplet id it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Never connect this droplet to a prior frame, whatever the match.
    Suppress,
    /// Connect this droplet to the given predecessor.
    LinkTo(u32),
}

pub type CorrectionMap = IndexMap<u32, Correction>;

/// Analysis settings echoed into a freshly created corrections file.
#[derive(Debug, Clone)]
pub struct CorrectionFileSettings {
    pub video_file_name: String,
    pub threshold: i32,
    pub frame_history: u32,
    pub droplet_similarity: u32,
    pub distance_threshold: u32,
}

/// Load corrections if the file exists; otherwise write the template and
/// report no corrections (`None` count marks a fresh file).
pub fn load_or_create(
    path: &Path,
    settings: &CorrectionFileSettings,
) -> Result<(CorrectionMap, Option<usize>)> {
    if path.exists() {
        let (corrections, count) = load_correction_file(path)?;
        Ok((corrections, Some(count)))
    } else {
        fs::write(path, template_text(settings))
            .with_context(|| format!("cannot create correction file {}", path.display()))?;
        Ok((CorrectionMap::new(), None))
    }
}

/// Parse a corrections file. Blank lines and lines starting with `#` are
/// skipped; anything after a mid-line `#` is a comment. A line with one
/// number suppresses, two numbers link, anything else gets a warning.
/// Returns the corrections and how many lines carried one.
pub fn load_correction_file(path: &Path) -> Result<(CorrectionMap, usize)> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read correction file {}", path.display()))?;

    let number = Regex::new(r"(\d+)")?;
    let mut corrections = CorrectionMap::new();
    let mut correction_count = 0;

    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let head = line.split('#').next().unwrap_or("");
        let matches: Vec<u32> = number
            .find_iter(head)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        match matches.as_slice() {
            [droplet, predecessor] => {
                corrections.insert(*droplet, Correction::LinkTo(*predecessor));
                correction_count += 1;
            }
            [droplet] => {
                corrections.insert(*droplet, Correction::Suppress);
                correction_count += 1;
            }
            _ => {
                warn!(
                    "Oops! Correction file line {} isn't something we expected:\n    {}",
                    i + 1,
                    line
                );
            }
        }
    }

    Ok((corrections, correction_count))
}

fn template_text(settings: &CorrectionFileSettings) -> String {
    format!(
        "\
# Droplet correction file for video data file:

# {file_name}

# The video file was analyzed with these parameter settings:

# video threshold: {threshold}
# frame history: {frame_history}
# droplet similarity threshold: {droplet_similarity}
# droplet distance threshold: {droplet_distance}

# THESE CORRECTIONS MAY NOT BE VALID IF THE VIDEO DATA IS PROCESSED WITH OTHER SETTINGS!

# This file is used to correct droplet history assignments when the video data file is evaluated.
# All lines starting with \"#\" are comments and will be ignored, as will any text after a \"#\"
# in the middle of a line.

# Blank lines will be ignored, as will any extra whitespace in lines.

# To force a droplet to be ignored when the software is mistakenly identifying it as a repeat
# of a droplet in a prior frame, but the number of that droplet on a line by itself. (Without
# the leading number sign, of course.):

# 34

# To indicate a droplet is a repeat of a prior droplet when it was either not assigned or mistakenly
# assigned to the wrong predecessor, put its number first on a line followed by the number of
# its correct predecessor:

# 34 30

",
        file_name = settings.video_file_name,
        threshold = settings.threshold,
        frame_history = settings.frame_history,
        droplet_similarity = settings.droplet_similarity,
        droplet_distance = settings.distance_threshold,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn settings() -> CorrectionFileSettings {
        CorrectionFileSettings {
            video_file_name: "sneeze_01.mp4".to_string(),
            threshold: 62,
            frame_history: 1,
            droplet_similarity: 30,
            distance_threshold: 40,
        }
    }

    fn write_lines(dir: &tempfile::TempDir, lines: &str) -> std::path::PathBuf {
        let path = dir.path().join("test.corrections");
        let mut file = File::create(&path).unwrap();
        file.write_all(lines.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parses_suppressions_and_links() {
        let dir = tempdir().unwrap();
        let path = write_lines(&dir, "# comment\n\n34\n35 30  # trailing note\n");

        let (corrections, count) = load_correction_file(&path).unwrap();
        assert_eq!(count, 2);
        assert_eq!(corrections.get(&34), Some(&Correction::Suppress));
        assert_eq!(corrections.get(&35), Some(&Correction::LinkTo(30)));
    }

    #[test]
    fn test_indented_comment_counts_as_garbage_not_correction() {
        // Only a '#' in column one makes a comment line; an indented one
        // falls through to the parser and yields no numbers before the '#'.
        let dir = tempdir().unwrap();
        let path = write_lines(&dir, "  # 12\n");

        let (corrections, count) = load_correction_file(&path).unwrap();
        assert!(corrections.is_empty());
        assert_eq!(count, 0);
    }

    #[test]
    fn test_extra_numbers_are_rejected() {
        let dir = tempdir().unwrap();
        let path = write_lines(&dir, "1 2 3\n");

        let (corrections, count) = load_correction_file(&path).unwrap();
        assert!(corrections.is_empty());
        assert_eq!(count, 0);
    }

    #[test]
    fn test_later_line_overrides_earlier_for_same_droplet() {
        let dir = tempdir().unwrap();
        let path = write_lines(&dir, "40\n40 12\n");

        let (corrections, count) = load_correction_file(&path).unwrap();
        assert_eq!(count, 2);
        assert_eq!(corrections.get(&40), Some(&Correction::LinkTo(12)));
    }

    #[test]
    fn test_creates_template_when_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh.corrections");

        let (corrections, count) = load_or_create(&path, &settings()).unwrap();
        assert!(corrections.is_empty());
        assert_eq!(count, None);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("# sneeze_01.mp4"));
        assert!(text.contains("# video threshold: 62"));
        assert!(text.contains("# droplet distance threshold: 40"));

        // A template file parses to zero corrections.
        let (reloaded, reload_count) = load_or_create(&path, &settings()).unwrap();
        assert!(reloaded.is_empty());
        assert_eq!(reload_count, Some(0));
    }
}
