// erf_mri_core - multi-rate time integration core for a terrain-following
// compressible atmospheric flow solver
// Copyright (C) 2021 Julian Jeggle, Raphael Wittkowski

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Terrain-metric helpers: the contravariant vertical momentum `Ω` and its
//! inverse `W`, plus the lateral metric terms `∂z/∂ξ`, `∂z/∂η` that couple
//! horizontal and vertical fluxes on a terrain-following mesh.
//!
//! Grounded in `TerrainMetrics.H`'s `OmegaFromW` / `WFromOmega` free
//! functions: face-averaged horizontal velocities are multiplied by the
//! node-height slope to remove (or restore) the horizontal contribution to
//! the vertical coordinate flux.

use crate::grid::Geometry;

/// `∂z/∂ξ` at the west face of cell `(i,j,k)`, centered in y and k: the
/// average of the four node-height differences bracketing that face.
pub fn met_xi(geom: &Geometry, i: i32, j: i32, k: i32) -> f64 {
    let dzdxi_lo = (geom.node(i, j, k) - geom.node(i - 1, j, k)) / geom.dx;
    let dzdxi_hi = (geom.node(i, j + 1, k) - geom.node(i - 1, j + 1, k)) / geom.dx;
    let dzdxi_lo_up = (geom.node(i, j, k + 1) - geom.node(i - 1, j, k + 1)) / geom.dx;
    let dzdxi_hi_up = (geom.node(i, j + 1, k + 1) - geom.node(i - 1, j + 1, k + 1)) / geom.dx;
    0.25 * (dzdxi_lo + dzdxi_hi + dzdxi_lo_up + dzdxi_hi_up)
}

/// `∂z/∂η` at the south face of cell `(i,j,k)`, centered in x and k.
pub fn met_eta(geom: &Geometry, i: i32, j: i32, k: i32) -> f64 {
    let dzdeta_lo = (geom.node(i, j, k) - geom.node(i, j - 1, k)) / geom.dy;
    let dzdeta_hi = (geom.node(i + 1, j, k) - geom.node(i + 1, j - 1, k)) / geom.dy;
    let dzdeta_lo_up = (geom.node(i, j, k + 1) - geom.node(i, j - 1, k + 1)) / geom.dy;
    let dzdeta_hi_up = (geom.node(i + 1, j, k + 1) - geom.node(i + 1, j - 1, k + 1)) / geom.dy;
    0.25 * (dzdeta_lo + dzdeta_hi + dzdeta_lo_up + dzdeta_hi_up)
}

/// `Ω = w - (∂z/∂ξ) u_f - (∂z/∂η) v_f` at a z-face, where `u_f, v_f` are
/// the horizontal velocities averaged onto that face. At `k == 0` the slope
/// terms are extrapolated from the first interior face (no-flow-through
/// lower boundary), matching the donor's `k==0` special case.
pub fn omega_from_w(
    geom: &Geometry,
    i: i32,
    j: i32,
    k: i32,
    w: f64,
    u_face_avg: f64,
    v_face_avg: f64,
) -> f64 {
    if !geom.has_terrain() {
        return w;
    }
    let k_metric = k.max(1);
    let gp_xi = met_xi(geom, i, j, k_metric);
    let gp_eta = met_eta(geom, i, j, k_metric);
    w - gp_xi * u_face_avg - gp_eta * v_face_avg
}

/// Inverse of [`omega_from_w`]: recovers `w` given `Ω` and the same
/// face-averaged horizontal velocities.
pub fn w_from_omega(
    geom: &Geometry,
    i: i32,
    j: i32,
    k: i32,
    omega: f64,
    u_face_avg: f64,
    v_face_avg: f64,
) -> f64 {
    if !geom.has_terrain() {
        return omega;
    }
    let k_metric = k.max(1);
    let gp_xi = met_xi(geom, i, j, k_metric);
    let gp_eta = met_eta(geom, i, j, k_metric);
    omega + gp_xi * u_face_avg + gp_eta * v_face_avg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Box3, Periodicity};

    fn flat_geom() -> Geometry {
        Geometry::flat(Box3::new((0, 0, 0), (3, 3, 3)), 100.0, 100.0, 50.0, Periodicity::default())
    }

    #[test]
    fn omega_equals_w_without_terrain() {
        let g = flat_geom();
        assert_eq!(omega_from_w(&g, 1, 1, 2, 3.0, 5.0, 7.0), 3.0);
    }

    #[test]
    fn omega_w_roundtrip_with_terrain() {
        let domain = Box3::new((0, 0, 0), (1, 1, 3));
        let (nx, ny, nz) = (3usize, 3usize, 5usize);
        let mut z = vec![0.0; nx * ny * nz];
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    z[(k * ny + j) * nx + i] = k as f64 * 50.0 + 2.0 * i as f64;
                }
            }
        }
        let geom = Geometry::with_terrain(domain, 100.0, 100.0, Periodicity::default(), z).unwrap();
        let omega = omega_from_w(&geom, 0, 0, 2, 4.0, 1.5, 0.5);
        let w_back = w_from_omega(&geom, 0, 0, 2, omega, 1.5, 0.5);
        assert!((w_back - 4.0).abs() < 1e-10);
    }
}
