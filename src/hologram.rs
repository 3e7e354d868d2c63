#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
//! Forked-grating vortex holograms.
//!
//! The phase at pixel `(i, j)` is `l * atan2(Y - y0, X - x0) + 2π (Y ny / H + X nx / W)` wrapped
//! into `[0, 2π)`, where `X = j - W/2` and `Y = i - H/2`. The vortex term is centred on the offset
//! while the linear grating stays fixed to the panel.

use std::f64::consts::TAU;

use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub type HologramImage = GrayImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HologramParams {
    /// topological charge; the sign picks the handedness of the vortex
    pub l: i32,
    /// grating periods across the panel width
    pub nx: i32,
    /// grating periods across the panel height
    pub ny: i32,
    pub x0: i32,
    pub y0: i32,
}

impl Default for HologramParams {
    fn default() -> Self {
        HologramParams {
            l: 2,
            nx: 50,
            ny: 50,
            x0: 0,
            y0: 0,
        }
    }
}

impl HologramParams {
    #[must_use]
    pub fn with_offset(self, x0: i32, y0: i32) -> Self {
        HologramParams { x0, y0, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelGeometry {
    pub width: u32,
    pub height: u32,
}

impl PanelGeometry {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        PanelGeometry { width, height }
    }

    #[inline]
    #[must_use]
    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<&slm_sys::Placement> for PanelGeometry {
    fn from(placement: &slm_sys::Placement) -> Self {
        PanelGeometry::new(placement.width, placement.height)
    }
}

/// Wrapped phase before conversion to 8 bits, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseField {
    geometry: PanelGeometry,
    data: Vec<f64>,
}

impl PhaseField {
    #[inline]
    #[must_use]
    pub fn geometry(&self) -> PanelGeometry {
        self.geometry
    }

    /// Phase at column `col`, row `row`.
    /// # Panics
    /// Panics if the pixel lies outside the panel.
    #[inline]
    #[must_use]
    pub fn get(&self, col: u32, row: u32) -> f64 {
        assert!(col < self.geometry.width && row < self.geometry.height);
        self.data[row as usize * self.geometry.width as usize + col as usize]
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(0.0, f64::max)
    }
}

#[inline]
#[must_use]
pub fn wrap_phase(theta: f64) -> f64 {
    let wrapped = theta.rem_euclid(TAU);
    // rem_euclid may round up to exactly 2π for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

#[must_use]
pub fn phase_field(params: &HologramParams, geometry: PanelGeometry) -> PhaseField {
    let mut data = vec![0.0; geometry.pixels()];
    if geometry.is_empty() {
        return PhaseField { geometry, data };
    }
    let half_w = f64::from(geometry.width) / 2.0;
    let half_h = f64::from(geometry.height) / 2.0;
    let gx = f64::from(params.nx) / f64::from(geometry.width);
    let gy = f64::from(params.ny) / f64::from(geometry.height);
    let l = f64::from(params.l);
    let x0 = f64::from(params.x0);
    let y0 = f64::from(params.y0);

    data.par_chunks_mut(geometry.width as usize)
        .enumerate()
        .for_each(|(i, row)| {
            let y = i as f64 - half_h;
            for (j, theta) in row.iter_mut().enumerate() {
                let x = j as f64 - half_w;
                let phi = (y - y0).atan2(x - x0);
                *theta = wrap_phase(l * phi + TAU * (y * gy + x * gx));
            }
        });
    PhaseField { geometry, data }
}

/// Scale by `255 / max` over this field and truncate. The scale follows each frame's own maximum
/// rather than 2π, so brightness is not comparable between parameter sets.
#[must_use]
pub fn normalize(field: &PhaseField) -> HologramImage {
    let PanelGeometry { width, height } = field.geometry;
    let max = field.max();
    if max <= 0.0 {
        return GrayImage::new(width, height);
    }
    let pixels: Vec<u8> = field
        .data
        .par_iter()
        .map(|&theta| (theta / max * 255.0) as u8)
        .collect();
    GrayImage::from_raw(width, height, pixels).unwrap_or_else(|| GrayImage::new(width, height))
}

#[must_use]
pub fn generate(params: &HologramParams, geometry: PanelGeometry) -> HologramImage {
    normalize(&phase_field(params, geometry))
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use rand::Rng;

    use super::*;

    fn circular_distance(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(TAU);
        d.min(TAU - d)
    }

    // signed phase step folded into (-π, π]
    fn fold(d: f64) -> f64 {
        let r = d.rem_euclid(TAU);
        if r > PI {
            r - TAU
        } else {
            r
        }
    }

    fn winding(field: &PhaseField, col: u32, row: u32) -> f64 {
        let ring = [
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
            (-1, 0),
            (-1, -1),
            (0, -1),
            (1, -1),
        ];
        let at = |(dx, dy): (i32, i32)| {
            field.get((col as i32 + dx) as u32, (row as i32 + dy) as u32)
        };
        (0..ring.len())
            .map(|k| fold(at(ring[(k + 1) % ring.len()]) - at(ring[k])))
            .sum::<f64>()
            / TAU
    }

    #[test]
    fn output_matches_panel() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let geometry = PanelGeometry::new(rng.gen_range(1..40), rng.gen_range(1..40));
            let params = HologramParams {
                l: rng.gen_range(-6..=6),
                nx: rng.gen_range(0..200),
                ny: rng.gen_range(0..200),
                x0: rng.gen_range(-50..50),
                y0: rng.gen_range(-50..50),
            };
            let image = generate(&params, geometry);
            assert_eq!(image.dimensions(), (geometry.width, geometry.height));
            let field = phase_field(&params, geometry);
            assert!(field.as_slice().iter().all(|&t| (0.0..TAU).contains(&t)));
            // normalized against its own maximum
            let brightest = image.pixels().map(|p| p.0[0]).max().unwrap();
            if field.max() > 0.0 {
                assert_eq!(brightest, 255);
            } else {
                assert_eq!(brightest, 0);
            }
        }
    }

    #[test]
    fn odd_panel_is_centred_on_half_pixels() {
        let params = HologramParams {
            l: 1,
            nx: 0,
            ny: 0,
            x0: 0,
            y0: 0,
        };
        let field = phase_field(&params, PanelGeometry::new(5, 3));
        // X = -2.5 .. 1.5, Y = -1.5 .. 0.5
        let expected = wrap_phase((-1.5_f64).atan2(-2.5));
        assert!((field.get(0, 0) - expected).abs() < 1e-12);
        let expected = wrap_phase(0.5_f64.atan2(1.5));
        assert!((field.get(4, 2) - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_charge_is_pure_grating() {
        let geometry = PanelGeometry::new(64, 48);
        let base = HologramParams {
            l: 0,
            nx: 7,
            ny: 3,
            x0: 0,
            y0: 0,
        };
        let field = phase_field(&base, geometry);
        let shifted = phase_field(&base.with_offset(13, -9), geometry);
        assert_eq!(field, shifted);
        for row in 0..geometry.height {
            for col in 0..geometry.width {
                let x = f64::from(col) - 32.0;
                let y = f64::from(row) - 24.0;
                let grating = wrap_phase(TAU * (y * 3.0 / 48.0 + x * 7.0 / 64.0));
                assert!(circular_distance(field.get(col, row), grating) < 1e-9);
            }
        }
    }

    #[test]
    fn negated_charge_mirrors_vortex() {
        let geometry = PanelGeometry::new(40, 30);
        let params = HologramParams {
            l: 3,
            nx: 11,
            ny: 5,
            x0: 4,
            y0: -2,
        };
        let mirrored = HologramParams { l: -3, ..params };
        let plus = phase_field(&params, geometry);
        let minus = phase_field(&mirrored, geometry);
        let grating_only = phase_field(&HologramParams { l: 0, ..params }, geometry);
        // vortex terms cancel, leaving twice the grating
        for ((p, m), g) in plus
            .as_slice()
            .iter()
            .zip(minus.as_slice())
            .zip(grating_only.as_slice())
        {
            assert!(circular_distance(p + m, 2.0 * g) < 1e-9);
        }
    }

    #[test]
    fn negated_charge_is_reflection_without_grating() {
        let geometry = PanelGeometry::new(32, 32);
        let params = HologramParams {
            l: 2,
            nx: 0,
            ny: 0,
            x0: 0,
            y0: 0,
        };
        let plus = phase_field(&params, geometry);
        let minus = phase_field(&HologramParams { l: -2, ..params }, geometry);
        // Y -> -Y maps row i to row 32 - i
        for row in 1..32 {
            for col in 0..32 {
                assert!(circular_distance(plus.get(col, row), minus.get(col, 32 - row)) < 1e-9);
            }
        }
    }

    #[test]
    fn singularity_follows_offset() {
        let geometry = PanelGeometry::new(200, 160);
        for (x0, y0) in [(0, 0), (30, -20), (-70, 55), (95, 75)] {
            for l in [-2, 1, 2] {
                let params = HologramParams {
                    l,
                    nx: 10,
                    ny: 8,
                    x0,
                    y0,
                };
                let field = phase_field(&params, geometry);
                let col = (x0 + 100) as u32;
                let row = (y0 + 80) as u32;
                assert!((winding(&field, col, row) - f64::from(l)).abs() < 1e-6);
                // nowhere else near the centre
                assert!(winding(&field, col - 3, row).abs() < 1e-6);
                assert!(winding(&field, col, row - 3).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn flat_phase_gives_black_image() {
        let params = HologramParams {
            l: 0,
            nx: 0,
            ny: 0,
            x0: 12,
            y0: 3,
        };
        let image = generate(&params, PanelGeometry::new(16, 9));
        assert!(image.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn empty_panel() {
        let image = generate(&HologramParams::default(), PanelGeometry::new(0, 10));
        assert_eq!(image.dimensions(), (0, 10));
    }
}
