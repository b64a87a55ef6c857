// src/droplet.rs
//
// Droplet identity and sighting history.
//
// Every contour found in the initial scan becomes a Droplet with a unique,
// video-wide id. When the tracker decides a later contour is a re-sighting
// of an earlier droplet, the new location data is pushed onto the earlier
// droplet's sighting list and the newcomer's id is rewritten to match.
// The sighting recorded first under an id keeps that number forever as
// `initial_id`, so the data file can show both halves of every match.
//
// Design:
//   - Newest sighting always at the front; accessors read the front
//   - Centroids are float pairs from polygon moments, not pixel-snapped
//   - Ids come from a resettable generator owned by the catalog, so a
//     rescan renumbers from 1 exactly like the first pass

use std::collections::VecDeque;

use crate::geometry::Point;

// ============================================================================
// ID ALLOCATION
// ============================================================================

/// Hands out consecutive droplet ids starting at 1.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    next: u32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Restart numbering, used when a threshold change forces a rescan.
    pub fn reset(&mut self) {
        self.next = 1;
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SIGHTINGS
// ============================================================================

/// One recorded sighting of a droplet: where it was, how big, and under
/// which ids it was known at the time.
#[derive(Debug, Clone)]
pub struct Sighting {
    pub contour: Vec<Point>,
    pub centroid: (f64, f64),
    pub area: u32,
    pub frame: usize,
    /// The id this contour was created with in the scan pass.
    pub initial_id: u32,
    /// The id the contour resolved to (the surviving droplet's id).
    pub id: u32,
}

#[derive(Debug, Clone)]
pub struct Droplet {
    id: u32,
    /// Sightings, newest first.
    data: VecDeque<Sighting>,
}

impl Droplet {
    pub fn new(id: u32, contour: Vec<Point>, area: u32, frame: usize) -> Self {
        let centroid = contour_centroid(&contour);
        let mut data = VecDeque::new();
        data.push_front(Sighting {
            contour,
            centroid,
            area,
            frame,
            initial_id: id,
            id,
        });
        Self { id, data }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Rewrite this droplet's id after the tracker resolves it to an
    /// earlier droplet.
    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn contour(&self) -> &[Point] {
        &self.data[0].contour
    }

    pub fn centroid(&self) -> (f64, f64) {
        self.data[0].centroid
    }

    pub fn area(&self) -> u32 {
        self.data[0].area
    }

    pub fn frame(&self) -> usize {
        self.data[0].frame
    }

    /// Initial id of the most recent sighting. After a relocation this is
    /// the newcomer's original number, which the label and the data file
    /// report alongside the resolved id.
    pub fn initial_id(&self) -> u32 {
        self.data[0].initial_id
    }

    pub fn current_sighting(&self) -> &Sighting {
        &self.data[0]
    }

    /// Record a re-sighting: push the incoming droplet's current location
    /// data, stamped with this droplet's id.
    pub fn relocate(&mut self, incoming: Sighting) {
        let sighting = Sighting {
            id: self.id,
            ..incoming
        };
        self.data.push_front(sighting);
    }

    /// Number of recorded sightings.
    pub fn generations(&self) -> usize {
        self.data.len()
    }

    /// Contours of every sighting, newest first, for the history trail.
    pub fn contour_history(&self) -> impl Iterator<Item = &[Point]> {
        self.data.iter().map(|s| s.contour.as_slice())
    }
}

// ============================================================================
// CENTROID
// ============================================================================

/// Centroid of a closed contour from its polygon spatial moments
/// (Green's theorem over consecutive boundary points, the same figure
/// OpenCV's moments produce). A contour with no interior, a single pixel
/// or a bare line, has a zero area moment; those fall back to the plain
/// average of the points.
pub fn contour_centroid(points: &[Point]) -> (f64, f64) {
    let n = points.len();
    if n == 0 {
        return (0.0, 0.0);
    }

    let mut a00 = 0.0f64;
    let mut a10 = 0.0f64;
    let mut a01 = 0.0f64;
    let mut prev = points[n - 1];
    for &p in points {
        let (x0, y0) = (prev.x as f64, prev.y as f64);
        let (x1, y1) = (p.x as f64, p.y as f64);
        let cross = x0 * y1 - x1 * y0;
        a00 += cross;
        a10 += cross * (x0 + x1);
        a01 += cross * (y0 + y1);
        prev = p;
    }

    if a00.abs() > f64::EPSILON {
        // Signs cancel in the ratio, so orientation doesn't matter.
        let m00 = a00 * 0.5;
        (a10 / 6.0 / m00, a01 / 6.0 / m00)
    } else {
        let count = n as f64;
        let sum_x: f64 = points.iter().map(|p| p.x as f64).sum();
        let sum_y: f64 = points.iter().map(|p| p.y as f64).sum();
        (sum_x / count, sum_y / count)
    }
}
