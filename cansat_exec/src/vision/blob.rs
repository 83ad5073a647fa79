//! # Colour blob detection
//!
//! Finds the largest red region in a frame. Colours are compared in HSV on
//! the 8 bit OpenCV scale (H in 0-179, S and V in 0-255).

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eqpt_if::eqpt::cam::{BoundingBox, RgbImage};
use serde::Deserialize;
use std::collections::VecDeque;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An inclusive hue band with lower saturation and value bounds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct HsvBand {
    pub h_min: u8,
    pub h_max: u8,
    pub s_min: u8,
    pub v_min: u8,
}

/// A connected region of masked pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub area_px: usize,

    /// Pixel bounds, max edges exclusive
    pub bbox: BoundingBox,
}

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Red wraps around zero hue so it needs two bands.
pub const RED_BANDS: [HsvBand; 2] = [
    HsvBand {
        h_min: 0,
        h_max: 18,
        s_min: 117,
        v_min: 115,
    },
    HsvBand {
        h_min: 169,
        h_max: 179,
        s_min: 117,
        v_min: 104,
    },
];

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Convert an RGB pixel to HSV on the OpenCV 8 bit scale.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> (u8, u8, u8) {
    let r = rgb[0] as f64;
    let g = rgb[1] as f64;
    let b = rgb[2] as f64;

    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { diff / v * 255.0 } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    }
    else if v == r {
        60.0 * (g - b) / diff
    }
    else if v == g {
        120.0 + 60.0 * (b - r) / diff
    }
    else {
        240.0 + 60.0 * (r - g) / diff
    };

    if h < 0.0 {
        h += 360.0;
    }

    // Half degrees so hue fits in a byte
    let h = ((h / 2.0).round() as u32 % 180) as u8;

    (h, s.round().min(255.0) as u8, v as u8)
}

impl HsvBand {
    pub fn contains(&self, hsv: (u8, u8, u8)) -> bool {
        let (h, s, v) = hsv;
        h >= self.h_min && h <= self.h_max && s >= self.s_min && v >= self.v_min
    }
}

impl Blob {
    pub fn centre_x(&self) -> f64 {
        self.bbox.centre_x()
    }

    pub fn area_fraction(&self, width: u32, height: u32) -> f64 {
        let total = width as f64 * height as f64;

        if total > 0.0 {
            self.area_px as f64 / total
        }
        else {
            0.0
        }
    }
}

/// Row major mask of the pixels falling in any of the bands.
pub fn colour_mask(frame: &RgbImage, bands: &[HsvBand]) -> Vec<bool> {
    frame
        .pixels()
        .map(|p| {
            let hsv = rgb_to_hsv(p.0);
            bands.iter().any(|b| b.contains(hsv))
        })
        .collect()
}

/// Largest 8-connected region of pixels matching the bands.
///
/// Regions of `min_area_px` pixels or fewer are treated as noise.
pub fn largest_blob(frame: &RgbImage, bands: &[HsvBand], min_area_px: usize) -> Option<Blob> {
    let (width, height) = frame.dimensions();
    let (w, h) = (width as usize, height as usize);

    let mask = colour_mask(frame, bands);
    let mut visited = vec![false; mask.len()];
    let mut best: Option<Blob> = None;
    let mut queue = VecDeque::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }

        visited[start] = true;
        queue.push_back(start);

        let mut area_px = 0;
        let (mut x_min, mut y_min) = (usize::MAX, usize::MAX);
        let (mut x_max, mut y_max) = (0, 0);

        while let Some(idx) = queue.pop_front() {
            let (x, y) = (idx % w, idx / w);
            area_px += 1;
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;

                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }

                    let n = ny as usize * w + nx as usize;
                    if mask[n] && !visited[n] {
                        visited[n] = true;
                        queue.push_back(n);
                    }
                }
            }
        }

        if area_px <= min_area_px {
            continue;
        }

        if best.map_or(true, |b| area_px > b.area_px) {
            best = Some(Blob {
                area_px,
                bbox: BoundingBox {
                    x_min: x_min as f64,
                    y_min: y_min as f64,
                    x_max: (x_max + 1) as f64,
                    y_max: (y_max + 1) as f64,
                },
            });
        }
    }

    best
}
