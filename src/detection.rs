// src/detection.rs
//
// Droplet detection on video frames, and the OpenCV-backed implementations
// of the shape comparison and text measurement traits the core modules
// define. Everything that touches a Mat for analysis lives here.
//
// Detection is deliberately simple: grayscale, blank the frame border to
// kill edge light scatter, binary threshold, external contours with no
// point approximation. Pixel areas come from a mask-only flood fill seeded
// on the contour, which counts actual lit pixels instead of the moment
// estimate.

use anyhow::Result;
use opencv::core::{self, Mat, Scalar, Vector};
use opencv::imgproc;
use opencv::prelude::*;

use crate::geometry::Point;
use crate::labeler::TextSizer;
use crate::tracker::ShapeComparator;

/// Grayscale, border blank and threshold, then find droplet contours.
/// Returns the contours and the thresholded frame they came from.
pub fn threshold_and_find_droplets(
    frame: &Mat,
    threshold: i32,
    border_width: i32,
) -> Result<(Vector<Vector<core::Point>>, Mat)> {
    let thresholded = threshold_frame(frame, threshold, border_width)?;
    let mut contours: Vector<Vector<core::Point>> = Vector::new();
    imgproc::find_contours(
        &thresholded,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_NONE,
        core::Point::new(0, 0),
    )?;
    Ok((contours, thresholded))
}

/// The thresholding half alone, for redisplay paths that already know
/// their droplets.
pub fn threshold_frame(frame: &Mat, threshold: i32, border_width: i32) -> Result<Mat> {
    let mut gray = Mat::default();
    imgproc::cvt_color(frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
    let bordered = recolor_border(&gray, border_width)?;
    threshold_image(&bordered, threshold)
}

/// Crop the border region away and pad back with black. Rectangle drawing
/// can't do this cleanly; its line width straddles the dimension line.
fn recolor_border(gray: &Mat, border_width: i32) -> Result<Mat> {
    let (height, width) = (gray.rows(), gray.cols());
    let bw = border_width;
    let cropped = Mat::roi(
        gray,
        core::Rect::new(bw, bw, width - 2 * bw, height - 2 * bw),
    )?;
    let mut bordered = Mat::default();
    core::copy_make_border(
        &cropped,
        &mut bordered,
        bw,
        bw,
        bw,
        bw,
        core::BORDER_CONSTANT,
        Scalar::all(0.0),
    )?;
    Ok(bordered)
}

fn threshold_image(gray: &Mat, threshold_value: i32) -> Result<Mat> {
    let mut thresholded = Mat::default();
    imgproc::threshold(
        gray,
        &mut thresholded,
        threshold_value as f64,
        255.0,
        imgproc::THRESH_BINARY,
    )?;
    Ok(thresholded)
}

/// Contour converted out of OpenCV's point type for the core modules.
pub fn contour_points(contour: &Vector<core::Point>) -> Vec<Point> {
    contour.iter().map(|p| Point::new(p.x, p.y)).collect()
}

// ============================================================================
// PIXEL AREA
// ============================================================================

/// Measures droplet pixel areas with a mask-only flood fill. The mask is
/// two pixels wider and taller than the frame and is reused per droplet.
pub struct AreaMeasure {
    mask: Mat,
}

impl AreaMeasure {
    pub fn new(frame_height: i32, frame_width: i32) -> Result<Self> {
        let mask = Mat::zeros(frame_height + 2, frame_width + 2, core::CV_8UC1)?.to_mat()?;
        Ok(Self { mask })
    }

    /// Flood fill from the contour's first point on the thresholded frame.
    /// The fill is mask-only, so the frame itself is left alone; the
    /// return value is the filled pixel count, the droplet's actual area.
    pub fn droplet_area(&mut self, thresholded: &mut Mat, seed: core::Point) -> Result<u32> {
        self.mask.set_to(&Scalar::all(0.0), &core::no_array())?;
        let mut fill_bounds = core::Rect::default();
        let count = imgproc::flood_fill_mask(
            thresholded,
            &mut self.mask,
            seed,
            Scalar::all(255.0),
            &mut fill_bounds,
            Scalar::new(20.0, 20.0, 20.0, 0.0),
            Scalar::new(20.0, 20.0, 20.0, 0.0),
            8 | imgproc::FLOODFILL_MASK_ONLY,
        )?;
        Ok(count.max(0) as u32)
    }
}

// ============================================================================
// TRAIT BACKENDS
// ============================================================================

/// Hu-moment contour comparison for the tracker. Raw scores; the tracker
/// does its own log rescale.
pub struct MatchShapesComparator;

impl ShapeComparator for MatchShapesComparator {
    fn dissimilarity(&self, a: &[Point], b: &[Point]) -> Result<f64> {
        let first = to_cv_points(a);
        let second = to_cv_points(b);
        let score = imgproc::match_shapes(&first, &second, imgproc::CONTOURS_MATCH_I2, 0.0)?;
        Ok(score)
    }
}

/// Hershey plain font metrics for the labeler.
pub struct HersheyTextSizer;

impl TextSizer for HersheyTextSizer {
    fn text_size(&self, text: &str, scale: f64) -> Result<(i32, i32, i32)> {
        let mut baseline = 0;
        let size = imgproc::get_text_size(text, imgproc::FONT_HERSHEY_PLAIN, scale, 1, &mut baseline)?;
        Ok((size.width, size.height, baseline))
    }
}

fn to_cv_points(points: &[Point]) -> Vector<core::Point> {
    points
        .iter()
        .map(|p| core::Point::new(p.x, p.y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Black BGR frame with one filled gray square.
    fn frame_with_square(x: i32, y: i32, side: i32, value: f64) -> Mat {
        let mut frame =
            Mat::new_rows_cols_with_default(100, 100, core::CV_8UC3, Scalar::all(0.0))
                .expect("frame");
        imgproc::rectangle(
            &mut frame,
            core::Rect::new(x, y, side, side),
            Scalar::all(value),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .expect("draw square");
        frame
    }

    #[test]
    fn test_finds_a_bright_square() {
        let frame = frame_with_square(40, 40, 10, 200.0);
        let (contours, _) = threshold_and_find_droplets(&frame, 62, 5).unwrap();
        assert_eq!(contours.len(), 1);

        let points = contour_points(&contours.get(0).unwrap());
        let min_x = points.iter().map(|p| p.x).min().unwrap();
        let max_x = points.iter().map(|p| p.x).max().unwrap();
        assert_eq!((min_x, max_x), (40, 49));
    }

    #[test]
    fn test_threshold_drops_dim_droplets() {
        let frame = frame_with_square(40, 40, 10, 50.0);
        let (contours, _) = threshold_and_find_droplets(&frame, 62, 5).unwrap();
        assert_eq!(contours.len(), 0, "50 is under the 62 threshold");
    }

    #[test]
    fn test_border_region_is_blanked() {
        // Bright square inside the 20px border band.
        let frame = frame_with_square(5, 5, 8, 200.0);
        let (contours, _) = threshold_and_find_droplets(&frame, 62, 20).unwrap();
        assert_eq!(contours.len(), 0);
    }

    #[test]
    fn test_flood_fill_counts_droplet_pixels() {
        let frame = frame_with_square(40, 40, 10, 200.0);
        let (contours, mut thresholded) = threshold_and_find_droplets(&frame, 62, 5).unwrap();
        let seed = contours.get(0).unwrap().get(0).unwrap();

        let mut gauge = AreaMeasure::new(100, 100).unwrap();
        let area = gauge.droplet_area(&mut thresholded, seed).unwrap();
        assert_eq!(area, 100, "10x10 square should fill 100 pixels");

        // The mask is reset between droplets, so a second measurement of
        // the same droplet agrees.
        let again = gauge.droplet_area(&mut thresholded, seed).unwrap();
        assert_eq!(again, 100);
    }

    #[test]
    fn test_match_shapes_scores() {
        let square: Vec<Point> = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        let bar: Vec<Point> = vec![
            Point::new(0, 0),
            Point::new(40, 0),
            Point::new(40, 4),
            Point::new(0, 4),
        ];

        let comparator = MatchShapesComparator;
        let same = comparator.dissimilarity(&square, &square).unwrap();
        let different = comparator.dissimilarity(&square, &bar).unwrap();
        assert!(same < 1e-12, "identical contours score {}", same);
        assert!(different > same);
    }

    #[test]
    fn test_hershey_metrics_scale() {
        let sizer = HersheyTextSizer;
        let (w1, h1, b1) = sizer.text_size("42", 1.0).unwrap();
        let (w2, h2, _) = sizer.text_size("42", 2.0).unwrap();
        assert!(w1 > 0 && h1 > 0 && b1 > 0);
        assert!(w2 > w1);
        assert!(h2 > h1);
    }
}
