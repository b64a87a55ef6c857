// src/catalog.rs
//
// Master catalog of everything the scan pass found: every frame, every
// droplet, and the lookup indices the second pass and the corrections
// machinery work from. The catalog owns the droplets; the tracker and the
// labeler refer to them by id.
//
// A threshold change rebuilds the whole catalog from a fresh scan, so the
// id generator lives here and restarts at 1 with it.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::droplet::{Droplet, IdGenerator};
use crate::frame::FrameRecord;
use crate::geometry::Point;

#[derive(Debug, Default)]
pub struct VideoCatalog {
    /// One record per video frame, in frame order.
    frames: Vec<FrameRecord>,
    /// Owning index, keyed by initial droplet id, in discovery order.
    droplets: IndexMap<u32, Droplet>,
    /// Truncated pixel area to droplet ids, for operator lookup.
    index_by_area: BTreeMap<u32, Vec<u32>>,
    /// Raw detection count per frame, before duplicate discovery.
    pub droplet_counts_by_frame: Vec<usize>,
    ids: IdGenerator,
}

impl VideoCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_frame(&mut self, index: usize) {
        self.frames.push(FrameRecord::new(index));
    }

    /// Record a detection: allocates the next id, builds the droplet, and
    /// files it in every index. Returns the new id.
    pub fn add_droplet(&mut self, frame_index: usize, contour: Vec<Point>, area: u32) -> u32 {
        let id = self.ids.next_id();
        let droplet = Droplet::new(id, contour, area, frame_index);
        if let Some(frame) = self.frames.get_mut(frame_index) {
            frame.droplet_ids.push(id);
        }
        self.droplets.insert(id, droplet);
        self.index_by_area.entry(area).or_default().push(id);
        id
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> Option<&FrameRecord> {
        self.frames.get(index)
    }

    /// Initial ids of the droplets detected in a frame. Unknown frames
    /// read as empty.
    pub fn frame_droplet_ids(&self, index: usize) -> &[u32] {
        self.frames
            .get(index)
            .map(|f| f.droplet_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn droplet(&self, id: u32) -> Option<&Droplet> {
        self.droplets.get(&id)
    }

    pub fn droplet_mut(&mut self, id: u32) -> Option<&mut Droplet> {
        self.droplets.get_mut(&id)
    }

    /// All initially-scanned droplets, in discovery order.
    pub fn droplets(&self) -> impl Iterator<Item = &Droplet> {
        self.droplets.values()
    }

    /// Count of droplets found in the scan, before duplicate discovery.
    pub fn initial_droplet_count(&self) -> usize {
        self.droplets.len()
    }

    pub fn droplet_ids_with_area(&self, area: u32) -> &[u32] {
        self.index_by_area
            .get(&area)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Push the duplicate's current sighting onto the original droplet.
    /// The duplicate's own id is rewritten separately by the tracker.
    pub fn relocate(&mut self, original_id: u32, duplicate_id: u32) {
        let incoming = match self.droplets.get(&duplicate_id) {
            Some(d) => d.current_sighting().clone(),
            None => return,
        };
        if let Some(original) = self.droplets.get_mut(&original_id) {
            original.relocate(incoming);
        }
    }

    pub fn set_droplet_id(&mut self, initial_id: u32, resolved_id: u32) {
        if let Some(droplet) = self.droplets.get_mut(&initial_id) {
            droplet.set_id(resolved_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(x: i32, y: i32) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + 4, y),
            Point::new(x + 4, y + 4),
            Point::new(x, y + 4),
        ]
    }

    fn catalog_with_two_frames() -> VideoCatalog {
        let mut catalog = VideoCatalog::new();
        catalog.add_frame(0);
        catalog.add_droplet(0, blob(10, 10), 25);
        catalog.add_droplet(0, blob(100, 100), 30);
        catalog.add_frame(1);
        catalog.add_droplet(1, blob(12, 12), 25);
        catalog
    }

    #[test]
    fn test_ids_count_from_one_in_scan_order() {
        let catalog = catalog_with_two_frames();
        assert_eq!(catalog.frame_droplet_ids(0), &[1, 2]);
        assert_eq!(catalog.frame_droplet_ids(1), &[3]);
        assert_eq!(catalog.frame_droplet_ids(5), &[] as &[u32]);
        assert_eq!(catalog.initial_droplet_count(), 3);

        let record = catalog.frame(1).expect("frame record");
        assert_eq!(record.index, 1);
        assert_eq!(record.droplet_count(), 1);
        assert!(catalog.frame(9).is_none());
    }

    #[test]
    fn test_area_index() {
        let catalog = catalog_with_two_frames();
        assert_eq!(catalog.droplet_ids_with_area(25), &[1, 3]);
        assert_eq!(catalog.droplet_ids_with_area(30), &[2]);
        assert_eq!(catalog.droplet_ids_with_area(99), &[] as &[u32]);
    }

    #[test]
    fn test_relocate_moves_sighting_and_keeps_ownership() {
        let mut catalog = catalog_with_two_frames();

        // Frame 1's droplet 3 turns out to be droplet 1 again.
        catalog.relocate(1, 3);
        catalog.set_droplet_id(3, 1);

        let original = catalog.droplet(1).unwrap();
        assert_eq!(original.generations(), 2);
        assert_eq!(original.frame(), 1);
        assert_eq!(original.initial_id(), 3);
        assert_eq!(original.id(), 1);

        // The duplicate still exists under its initial id, renumbered.
        let duplicate = catalog.droplet(3).unwrap();
        assert_eq!(duplicate.id(), 1);
        assert_eq!(duplicate.generations(), 1);
    }
}
