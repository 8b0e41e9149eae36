//! Static choropleth of one numeric column of the capacity join.
//!
//! Polygons are filled on a white canvas with an even-odd scanline sampled at
//! pixel centres, outlined in light grey, and a vertical colour bar runs along
//! the right edge. x and y share one scale so shapes are not distorted.

use anyhow::{Context, Result};
use geo::{Geometry, LineString};
use image::{ImageBuffer, Rgb as Pixel, RgbImage};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CaseStudyError;
use crate::geo_core::BoundingBox;
use crate::geometric::parcel_bins::CapacityJoin;
use crate::render::color::{blues, Normalize, Rgb, EDGE_GREY, OUTLINE, WHITE};

/// Figure size in inches and resolution, matplotlib-style
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FigureSize {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: f64,
}

impl FigureSize {
    pub fn new(width_in: f64, height_in: f64, dpi: f64) -> Self {
        FigureSize {
            width_in,
            height_in,
            dpi,
        }
    }

    /// Canvas size in pixels
    pub fn pixels(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi).round().max(1.0) as u32,
            (self.height_in * self.dpi).round().max(1.0) as u32,
        )
    }
}

impl Default for FigureSize {
    fn default() -> Self {
        FigureSize::new(15.0, 9.0, 100.0)
    }
}

/// Pixel rectangle
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

/// World to pixel transform with a single scale for both axes
struct Projection {
    bbox: BoundingBox,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Projection {
    fn fit(bbox: BoundingBox, frame: Frame) -> Self {
        let sx = frame.width / bbox.width().max(f64::EPSILON);
        let sy = frame.height / bbox.height().max(f64::EPSILON);
        let scale = sx.min(sy);
        Projection {
            bbox,
            scale,
            offset_x: frame.left + (frame.width - bbox.width() * scale) / 2.0,
            offset_y: frame.top + (frame.height - bbox.height() * scale) / 2.0,
        }
    }

    fn project(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.offset_x + (x - self.bbox.min_x) * self.scale,
            self.offset_y + (self.bbox.max_y - y) * self.scale,
        )
    }

    fn ring(&self, ring: &LineString<f64>) -> Vec<(f64, f64)> {
        ring.0.iter().map(|c| self.project(c.x, c.y)).collect()
    }
}

/// Choropleth renderer for one column
#[derive(Debug, Clone)]
pub struct Choropleth {
    pub column: String,
    pub figure: FigureSize,
}

impl Choropleth {
    pub fn new(column: &str, figure: FigureSize) -> Self {
        Choropleth {
            column: column.to_string(),
            figure,
        }
    }

    /// Map area and colour bar frames for a canvas
    fn layout(width: u32, height: u32) -> (Frame, Frame) {
        let (w, h) = (width as f64, height as f64);
        let map = Frame {
            left: w * 0.04,
            top: h * 0.05,
            width: w * 0.80,
            height: h * 0.90,
        };
        let bar = Frame {
            left: w * 0.88,
            top: h * 0.10,
            width: (w * 0.02).max(1.0),
            height: h * 0.80,
        };
        (map, bar)
    }

    /// Draw the map in memory
    pub fn render(&self, join: &CapacityJoin) -> Result<RgbImage> {
        let values = join.column(&self.column)?;
        if values.is_empty() {
            return Err(CaseStudyError::EmptyPlot.into());
        }
        let bbox = BoundingBox::from_geometries(join.records.iter().map(|r| &r.geometry))
            .ok_or(CaseStudyError::EmptyPlot)?;
        let norm = Normalize::from_values(&values).unwrap_or(Normalize { min: 0.0, max: 0.0 });

        let (width, height) = self.figure.pixels();
        let mut img: RgbImage = ImageBuffer::from_pixel(width, height, Pixel(WHITE.to_array()));
        let (map_frame, bar_frame) = Choropleth::layout(width, height);
        let projection = Projection::fit(bbox, map_frame);

        for (record, value) in join.records.iter().zip(&values) {
            let rings = geometry_rings(&record.geometry, &projection);
            fill_rings(&mut img, &rings, blues(norm.apply(*value)));
            for ring in &rings {
                stroke_ring(&mut img, ring, EDGE_GREY);
            }
        }

        draw_colorbar(&mut img, bar_frame);

        debug!(
            "Rendered {} records of '{}' (range {} to {}) at {}x{}",
            values.len(),
            self.column,
            norm.min,
            norm.max,
            width,
            height
        );
        Ok(img)
    }

    /// Render and save as PNG
    pub fn save<P: AsRef<Path>>(&self, join: &CapacityJoin, output_file: P) -> Result<()> {
        let output_file = output_file.as_ref();
        let img = self.render(join)?;
        img.save_with_format(output_file, image::ImageFormat::Png)
            .with_context(|| format!("Failed to write PNG file: {:?}", output_file))?;
        info!("Map of '{}' saved to: {:?}", self.column, output_file);
        Ok(())
    }
}

/// Exterior and interior rings of a polygonal geometry, in pixel space
fn geometry_rings(geometry: &Geometry<f64>, projection: &Projection) -> Vec<Vec<(f64, f64)>> {
    let polygons = match geometry {
        Geometry::Polygon(p) => vec![p],
        Geometry::MultiPolygon(mp) => mp.0.iter().collect(),
        _ => Vec::new(),
    };
    polygons
        .into_iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .map(|ring| projection.ring(ring))
        .collect()
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, Pixel(color.to_array()));
    }
}

/// Even-odd scanline fill; a pixel is inside when its centre is
fn fill_rings(img: &mut RgbImage, rings: &[Vec<(f64, f64)>], color: Rgb) {
    let ys = rings.iter().flatten().map(|&(_, y)| y);
    let (min_y, max_y) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
        (lo.min(y), hi.max(y))
    });
    if !min_y.is_finite() || !max_y.is_finite() {
        return;
    }

    let first_row = (min_y - 0.5).ceil().max(0.0) as i64;
    let last_row = (max_y - 0.5).floor().min(img.height() as f64 - 1.0) as i64;

    let mut crossings: Vec<f64> = Vec::new();
    for row in first_row..=last_row {
        let yc = row as f64 + 0.5;
        crossings.clear();
        for ring in rings {
            for edge in ring.windows(2) {
                let ((x0, y0), (x1, y1)) = (edge[0], edge[1]);
                if (y0 <= yc && yc < y1) || (y1 <= yc && yc < y0) {
                    crossings.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
                }
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));
        for span in crossings.chunks_exact(2) {
            let start = (span[0] - 0.5).ceil() as i64;
            let end = (span[1] - 0.5).ceil() as i64;
            for x in start..end {
                put(img, x, row, color);
            }
        }
    }
}

/// One-pixel outline along a ring
fn stroke_ring(img: &mut RgbImage, ring: &[(f64, f64)], color: Rgb) {
    for edge in ring.windows(2) {
        let ((x0, y0), (x1, y1)) = (edge[0], edge[1]);
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = x0 + (x1 - x0) * t;
            let y = y0 + (y1 - y0) * t;
            put(img, x.floor() as i64, y.floor() as i64, color);
        }
    }
}

/// Vertical ramp, darkest at the top, with a thin outline
fn draw_colorbar(img: &mut RgbImage, frame: Frame) {
    let left = frame.left.round() as i64;
    let right = (frame.left + frame.width).round() as i64;
    let top = frame.top.round() as i64;
    let bottom = (frame.top + frame.height).round() as i64;
    let rows = (bottom - top).max(1);

    for y in top..bottom {
        let t = 1.0 - (y - top) as f64 / (rows - 1).max(1) as f64;
        let color = blues(t);
        for x in left..right {
            put(img, x, y, color);
        }
    }
    for x in left - 1..=right {
        put(img, x, top - 1, OUTLINE);
        put(img, x, bottom, OUTLINE);
    }
    for y in top - 1..=bottom {
        put(img, left - 1, y, OUTLINE);
        put(img, right, y, OUTLINE);
    }
}
