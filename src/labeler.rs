// src/labeler.rs
//
// Per-frame droplet label layout.
//
// Every labeled droplet gets four candidate text areas, the quadrants just
// off the corners of its displayed contour box, numbered from 0 in the
// upper left and continuing clockwise. Placement runs in passes over the
// whole frame: rule out corners whose text would run off the frame edge,
// turn crowded labels away from their nearest neighbors, and fall back to
// the first open corner for anything still undecided.
//
// Design:
//   - Text measurement sits behind the TextSizer trait, so layout math is
//     testable without a rendering backend
//   - Labels live in an ordered map keyed by resolved droplet id
//   - Crowded frames chain droplets by proximity from the frame center and
//     point each label away from the average bearing of its chain neighbors
//   - The labeler only decides geometry; the annotation layer draws it

use anyhow::{bail, Result};
use indexmap::IndexMap;
use tracing::debug;

use crate::droplet::Droplet;
use crate::geometry::{average_angles, bearing_angle, distance, reverse_angle, Point, Rect};

/// Gap in pixels between the contour bounding box and anything drawn
/// around it.
const STAND_OFF: i32 = 2;

/// Line spacing inside the label text block.
const LEADING: i32 = 2;

/// Margin at the frame edge where label text may not land.
const FRAME_EDGE: i32 = 5;

// ============================================================================
// TEXT MEASUREMENT
// ============================================================================

/// Measures one line of label text at a font scale, returning width,
/// height and baseline in pixels. Production wraps OpenCV's Hershey
/// metrics; tests substitute fixed geometry.
pub trait TextSizer {
    fn text_size(&self, text: &str, scale: f64) -> Result<(i32, i32, i32)>;
}

#[derive(Debug, Clone)]
struct TextLine {
    text: String,
    width: i32,
    height: i32,
    baseline: i32,
}

fn measure(sizer: &dyn TextSizer, text: String, scale: f64) -> Result<TextLine> {
    let (width, height, baseline) = sizer.text_size(&text, scale)?;
    // Hershey metrics come back a pixel short in height and a pixel long
    // in baseline.
    Ok(TextLine {
        text,
        width,
        height: height + 1,
        baseline: baseline - 1,
    })
}

// ============================================================================
// LABEL
// ============================================================================

/// Baseline origins for the text lines of one label, ready for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextAnchors {
    pub id: (i32, i32),
    pub area: (i32, i32),
    /// Present only when the droplet was relinked and shows the id it was
    /// first found under.
    pub initial: Option<(i32, i32)>,
}

/// Layout state for one droplet's label.
#[derive(Debug, Clone)]
pub struct Label {
    pub id: u32,
    pub initial_id: u32,
    pub area: u32,
    pub frame_number: usize,
    /// Center of the full region the label could occupy, used for
    /// distances between labeled droplets.
    pub center: (f64, f64),
    /// Candidate text rectangles, upper left first, then clockwise.
    pub text_bounding_box: [Rect; 4],
    /// Cleared when a placement pass rules the corner out.
    pub corner_viable: [bool; 4],
    /// Corner picked for drawing once placement has run.
    pub corner_used: Option<usize>,
    contour_box: (Point, Point),
    id_line: TextLine,
    area_line: TextLine,
    initial_line: TextLine,
    text_box_width: i32,
}

impl Label {
    pub fn new(droplet: &Droplet, sizer: &dyn TextSizer) -> Result<Self> {
        let id = droplet.id();
        let initial_id = droplet.initial_id();
        let area = droplet.area();

        let initial_line = measure(sizer, initial_id.to_string(), 1.0)?;
        let id_line = measure(sizer, id.to_string(), 2.0)?;
        let area_line = measure(sizer, format!("{}px", area), 1.0)?;

        // The widest line sets the block width. The initial id line counts
        // even when it won't be drawn.
        let text_box_width = initial_line.width.max(id_line.width).max(area_line.width);
        let mut text_box_height =
            id_line.height + LEADING + area_line.baseline + LEADING + area_line.height;
        if initial_id != id {
            text_box_height += initial_line.height + 1;
        }

        let (x, y, w, h) = contour_bounds(droplet.contour());
        let box_ul = Point::new(x - STAND_OFF, y - STAND_OFF);
        let box_lr = Point::new(x + w + STAND_OFF, y + h + STAND_OFF);

        // Anchor points just off the displayed box corners, upper left
        // first, then clockwise.
        let points = [
            Point::new(box_ul.x - STAND_OFF, box_ul.y - STAND_OFF),
            Point::new(box_lr.x + STAND_OFF, box_ul.y - STAND_OFF),
            Point::new(box_lr.x + STAND_OFF, box_lr.y + STAND_OFF),
            Point::new(box_ul.x - STAND_OFF, box_lr.y + STAND_OFF),
        ];

        let text_bounding_box = [
            Rect::new(
                Point::new(points[0].x - text_box_width, points[0].y - text_box_height),
                points[0],
            ),
            Rect::new(
                Point::new(points[1].x, points[1].y - text_box_height),
                Point::new(points[1].x + text_box_width, points[1].y),
            ),
            Rect::new(
                points[2],
                Point::new(points[2].x + text_box_width, points[2].y + text_box_height),
            ),
            Rect::new(
                Point::new(points[3].x - text_box_width, points[3].y),
                Point::new(points[3].x, points[3].y + text_box_height),
            ),
        ];

        let center = Rect::new(
            text_bounding_box[0].upper_left(),
            text_bounding_box[2].lower_right(),
        )
        .center();

        Ok(Self {
            id,
            initial_id,
            area,
            frame_number: droplet.frame(),
            center,
            text_bounding_box,
            corner_viable: [true; 4],
            corner_used: None,
            contour_box: (box_ul, box_lr),
            id_line,
            area_line,
            initial_line,
            text_box_width,
        })
    }

    /// Corners of the displayed contour bounding box.
    pub fn contour_box(&self) -> (Point, Point) {
        self.contour_box
    }

    pub fn id_text(&self) -> &str {
        &self.id_line.text
    }

    pub fn area_text(&self) -> &str {
        &self.area_line.text
    }

    pub fn initial_text(&self) -> &str {
        &self.initial_line.text
    }

    /// Text baseline origins for drawing this label in the given corner.
    /// The line order flips between the upper and lower corners, with a
    /// couple of one-pixel tweaks so the spacing reads the same both ways.
    pub fn text_anchors(&self, corner: usize) -> Result<TextAnchors> {
        let rect = match self.text_bounding_box.get(corner) {
            Some(rect) => rect,
            None => bail!("Corner not correct: {}, frame {}.", corner, self.frame_number),
        };

        let id = &self.id_line;
        let area = &self.area_line;
        let initial = &self.initial_line;

        // Corners 0 and 1 sit above the droplet and stack lines up from
        // the bottom edge; 2 and 3 sit below and stack down from the top.
        let (id_y, area_y, initial_y) = if corner < 2 {
            let area_y = rect.max_y - id.height - area.baseline - LEADING;
            (rect.max_y, area_y, area_y - area.height - LEADING - 1)
        } else {
            let below = rect.min_y + id.height + area.baseline + area.height + LEADING;
            (
                rect.min_y + id.height,
                below - 2,
                below + initial.height + LEADING + 1,
            )
        };

        // Corners on the left edge right-align the text; on the right
        // edge it hangs off the anchor column.
        let (id_x, area_x, initial_x) = if corner == 0 || corner == 3 {
            (
                rect.min_x + (self.text_box_width - id.width),
                rect.min_x + (self.text_box_width - area.width),
                rect.min_x + (self.text_box_width - initial.width),
            )
        } else {
            (rect.min_x, rect.min_x, rect.min_x)
        };

        let initial = if self.initial_id != self.id {
            Some((initial_x, initial_y))
        } else {
            None
        };

        Ok(TextAnchors {
            id: (id_x, id_y),
            area: (area_x, area_y),
            initial,
        })
    }
}

/// Pixel-inclusive bounding box of a contour as (x, y, width, height).
fn contour_bounds(points: &[Point]) -> (i32, i32, i32, i32) {
    let first = match points.first() {
        Some(p) => *p,
        None => return (0, 0, 0, 0),
    };
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}

// ============================================================================
// LABELER
// ============================================================================

/// Places all the labels for one video frame.
pub struct Labeler {
    labels: IndexMap<u32, Label>,
    frame: usize,
    safe_boundary: Rect,
    frame_boundary: Rect,
}

impl Labeler {
    pub fn new(frame_index: usize, frame_shape: (i32, i32)) -> Self {
        let (frame_width, frame_height) = frame_shape;
        Self {
            labels: IndexMap::new(),
            frame: frame_index,
            safe_boundary: Rect::new(
                Point::new(FRAME_EDGE, FRAME_EDGE),
                Point::new(frame_width - FRAME_EDGE, frame_height - FRAME_EDGE),
            ),
            frame_boundary: Rect::new(
                Point::new(0, 0),
                Point::new(frame_width, frame_height),
            ),
        }
    }

    pub fn add_label(&mut self, droplet: &Droplet, sizer: &dyn TextSizer) -> Result<()> {
        let label = Label::new(droplet, sizer)?;
        self.labels.insert(label.id, label);
        Ok(())
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.labels.values()
    }

    pub fn label(&self, id: u32) -> Option<&Label> {
        self.labels.get(&id)
    }

    /// Decide a drawing corner for every label in the frame.
    pub fn place_labels(&mut self) {
        self.check_for_edge_closeness();

        if self.labels.len() > 1 {
            // A lone label only needs the edge check.
            self.log_label_overlaps();
            self.choose_label_corners();
        }

        for label in self.labels.values_mut() {
            if label.corner_used.is_none() {
                let open = (0..4).find(|&corner| label.corner_viable[corner]);
                // Nothing open still gets the lower right.
                label.corner_used = Some(open.unwrap_or(2));
            }
        }
    }

    /// Rule out any corner whose text box pokes past the safe margin
    /// inside the frame edges.
    fn check_for_edge_closeness(&mut self) {
        let safe = self.safe_boundary;
        for label in self.labels.values_mut() {
            for corner in 0..4 {
                if label.text_bounding_box[corner].outside(&safe) {
                    label.corner_viable[corner] = false;
                }
            }
        }
    }

    /// Overlap areas between every candidate text box of every pair of
    /// labels, as a diagnostic. A pair whose four same-corner cells all
    /// overlap is one droplet sitting on top of another.
    fn log_label_overlaps(&self) {
        let mut ids: Vec<u32> = self.labels.keys().copied().collect();
        ids.sort_unstable();

        for (index, &first) in ids.iter().enumerate() {
            for &second in &ids[index + 1..] {
                let overlaps = match (self.labels.get(&first), self.labels.get(&second)) {
                    (Some(a), Some(b)) => overlap_areas(a, b),
                    _ => continue,
                };
                let complete = overlaps[0] != 0
                    && overlaps[5] != 0
                    && overlaps[10] != 0
                    && overlaps[15] != 0;
                debug!(
                    "Label overlaps for frame {}, droplets {} and {}: {:?}{}",
                    self.frame + 1,
                    first,
                    second,
                    overlaps,
                    if complete { " (complete overlap)" } else { "" }
                );
            }
        }
    }

    /// Chain the labels by proximity starting nearest the frame center,
    /// then point each label away from the average bearing of its chain
    /// neighbors, so labels in a crowd fan outward.
    fn choose_label_corners(&mut self) {
        let ids: Vec<u32> = self.labels.keys().copied().collect();
        let centers: Vec<(f64, f64)> = self.labels.values().map(|l| l.center).collect();
        let chain = sort_nearest(self.frame_boundary.center(), centers, ids);

        let mut incoming: IndexMap<u32, Option<f64>> =
            chain.iter().map(|&id| (id, None)).collect();
        let mut outgoing = incoming.clone();

        for pair in chain.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if let (Some(a), Some(b)) = (self.labels.get(&from), self.labels.get(&to)) {
                outgoing.insert(from, Some(bearing_angle(a.center, b.center)));
                incoming.insert(to, Some(bearing_angle(b.center, a.center)));
            }
        }

        for droplet_id in chain {
            let angles = [
                incoming.get(&droplet_id).copied().flatten(),
                outgoing.get(&droplet_id).copied().flatten(),
            ];
            let average = match average_angles(&angles) {
                Some(angle) => angle,
                None => continue,
            };
            let away = reverse_angle(average);

            // Quadrant of the outward bearing, mapped to the label corner
            // facing that way.
            let corner_map = [1usize, 2, 3, 0];
            let corner = corner_map[(away / 90.0) as usize];

            if let Some(label) = self.labels.get_mut(&droplet_id) {
                if label.corner_viable[corner] {
                    label.corner_used = Some(corner);
                } else {
                    debug!(
                        "Found an edge collision: droplet {}, corner {}",
                        droplet_id, corner
                    );
                    // Labels near the frame edge usually aren't in the
                    // pile-up, so any open corner will do.
                    for candidate in 0..4 {
                        if label.corner_viable[candidate] {
                            label.corner_used = Some(candidate);
                            break;
                        }
                    }
                }
            }
        }
    }
}

fn overlap_areas(a: &Label, b: &Label) -> [i32; 16] {
    let mut areas = [0i32; 16];
    for first_corner in 0..4 {
        for second_corner in 0..4 {
            areas[first_corner * 4 + second_corner] = a.text_bounding_box[first_corner]
                .intersection(&b.text_bounding_box[second_corner])
                .area();
        }
    }
    areas
}

/// Orders droplet ids into a chain where each entry is the nearest
/// remaining droplet to its predecessor, seeded from a starting point
/// such as the frame center. Ties go to the earlier entry.
fn sort_nearest(start: (f64, f64), mut centers: Vec<(f64, f64)>, mut ids: Vec<u32>) -> Vec<u32> {
    let mut chain = Vec::with_capacity(ids.len());
    let mut point = start;

    while ids.len() > 1 {
        let mut nearest = 0;
        for index in 1..centers.len() {
            if distance(point, centers[index]) < distance(point, centers[nearest]) {
                nearest = index;
            }
        }
        chain.push(ids.remove(nearest));
        point = centers.remove(nearest);
    }
    chain.append(&mut ids);
    chain
}
