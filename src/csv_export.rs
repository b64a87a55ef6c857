// src/csv_export.rs
//
// Droplet data file.
//
// Rows are seeded from the scan pass, one per raw droplet sighting, keyed
// by counting frame number and the droplet's initial id. Processing fills
// in the resolved id and centroid as each frame goes by. A sighting that
// resolved to an earlier droplet reports its pixels in duplicate_pixels
// with initial_pixels blanked, so summing either column never counts the
// same droplet twice.

use std::path::PathBuf;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::warn;

use crate::catalog::VideoCatalog;

#[derive(Debug, Clone)]
struct CsvRow {
    assigned: Option<u32>,
    initial_pixels: Option<u32>,
    duplicate_pixels: Option<u32>,
    centroid: Option<(f64, f64)>,
}

pub struct CsvFile {
    path: PathBuf,
    rows: IndexMap<(usize, u32), CsvRow>,
    verbose: bool,
}

impl CsvFile {
    /// Seed one row per droplet sighting found in the scan pass.
    pub fn new(catalog: &VideoCatalog, path: PathBuf, verbose: bool) -> Self {
        let mut rows = IndexMap::new();
        for index in 0..catalog.frame_count() {
            for &droplet_id in catalog.frame_droplet_ids(index) {
                if let Some(droplet) = catalog.droplet(droplet_id) {
                    rows.insert(
                        (index + 1, droplet.initial_id()),
                        CsvRow {
                            assigned: None,
                            initial_pixels: Some(droplet.area()),
                            duplicate_pixels: None,
                            centroid: None,
                        },
                    );
                }
            }
        }
        Self {
            path,
            rows,
            verbose,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Fill in the resolved id, pixel area and centroid for one sighting.
    /// `frame` is the counting frame number.
    pub fn update_row(
        &mut self,
        frame: usize,
        initial_droplet_id: u32,
        assigned_droplet_id: u32,
        area: u32,
        centroid: (f64, f64),
    ) {
        let row = match self.rows.get_mut(&(frame, initial_droplet_id)) {
            Some(row) => row,
            None => {
                // A rescan can renumber droplets out from under rows
                // seeded by the first pass.
                warn!(
                    "No data row for frame {}, droplet {}.",
                    frame, initial_droplet_id
                );
                return;
            }
        };

        row.assigned = Some(assigned_droplet_id);
        if assigned_droplet_id == initial_droplet_id {
            row.duplicate_pixels = None;
        } else {
            row.initial_pixels = None;
            row.duplicate_pixels = Some(area);
        }
        row.centroid = Some(centroid);
    }

    /// Write the data file, rows ordered by assigned droplet id with any
    /// never-processed sightings first.
    pub fn write(&self) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path)
            .with_context(|| format!("can't create data file {}", self.path.display()))?;

        writer.write_record([
            "assigned_droplet_id",
            "initial_droplet_id",
            "frame",
            "initial_pixels",
            "duplicate_pixels",
            "centroid_x",
            "centroid_y",
        ])?;

        let mut rows: Vec<(&(usize, u32), &CsvRow)> = self.rows.iter().collect();
        rows.sort_by_key(|(_, row)| row.assigned);

        for (&(frame, initial_id), row) in rows {
            writer.write_record([
                cell(row.assigned),
                initial_id.to_string(),
                frame.to_string(),
                cell(row.initial_pixels),
                cell(row.duplicate_pixels),
                row.centroid.map(|c| c.0.to_string()).unwrap_or_default(),
                row.centroid.map(|c| c.1.to_string()).unwrap_or_default(),
            ])?;
        }
        writer.flush()?;

        if self.verbose {
            println!("\nCreated data file {}.", self.path.display());
        }
        Ok(())
    }
}

fn cell(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
