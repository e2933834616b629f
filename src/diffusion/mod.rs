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

//! Diffusion: viscous/turbulent fluxes for the scalar state, grounded in
//! `DiffusionSrcForState_T.cpp`'s staggered-flux assembly. The LES closure
//! (`les_type`) and the TKE/QKE source terms live in [`les`]; this module
//! assembles the flux divergence that consumes whichever `mu_turb` the
//! closure produced.

pub mod les;

use crate::config::{MolecDiffType, SolverChoice};
use crate::error::CoreResult;
use crate::grid::Geometry;
use crate::state::{BoxState, Field3};
use crate::terrain::{met_eta, met_xi};

/// Effective diffusivity at a cell: `rho*alpha` (constant-alpha) or
/// `alpha` directly (constant-rho-alpha), per `molec_diff_type`. Returns
/// `0.0` when molecular diffusion is disabled; LES mixing is added on top
/// by the caller via `mu_turb`.
fn molecular_alpha(sc: &SolverChoice, rho: f64) -> f64 {
    match sc.molec_diff_type {
        MolecDiffType::None => 0.0,
        MolecDiffType::Constant => sc.alpha_c,
        MolecDiffType::ConstantAlpha => rho * sc.alpha_t,
    }
}

/// The handling of a vertical diffusion face that sits on the physical
/// domain boundary, keyed by the BC applied to this field there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertFaceBc {
    /// Periodic or `ext_dir`: the ghost cell already carries the value the
    /// plain two-point difference needs (the `ext_dir` mirror fill makes
    /// that difference exactly the one-sided derivative).
    Interior,
    /// Zero-gradient extrapolation: the ghost is a flat copy of the
    /// interior cell, so the plain two-point difference would read back a
    /// spurious zero gradient. Uses a one-sided 2nd-order interior stencil
    /// instead.
    FoExtrap,
    /// Neumann or MOST surface flux: the flux is prescribed directly by
    /// the caller rather than estimated from a difference.
    PrescribedFlux,
}

/// Vertical boundary handling for one scalar field's diffusion. Defaults
/// to [`VertFaceBc::Interior`] on both ends, which reduces to the plain
/// two-point difference used throughout the interior.
#[derive(Debug, Clone, Copy)]
pub struct DiffusionBc {
    pub lo: VertFaceBc,
    pub hi: VertFaceBc,
    /// Prescribed `alpha*dphidz` flux at the low/high domain boundary,
    /// read only when the corresponding side is [`VertFaceBc::PrescribedFlux`].
    pub flux_lo: f64,
    pub flux_hi: f64,
}

impl DiffusionBc {
    pub fn interior() -> Self {
        Self { lo: VertFaceBc::Interior, hi: VertFaceBc::Interior, flux_lo: 0.0, flux_hi: 0.0 }
    }
}

fn h_zeta_x_face(geom: &Geometry, i: i32, j: i32, k: i32) -> f64 {
    0.5 * (geom.det_j(i - 1, j, k) + geom.det_j(i, j, k))
}

fn h_zeta_y_face(geom: &Geometry, i: i32, j: i32, k: i32) -> f64 {
    0.5 * (geom.det_j(i, j - 1, k) + geom.det_j(i, j, k))
}

fn h_zeta_z_face(geom: &Geometry, i: i32, j: i32, k_hi: i32, klo: i32, khi: i32) -> f64 {
    let below = (k_hi - 1).clamp(klo, khi);
    let above = k_hi.clamp(klo, khi);
    0.5 * (geom.det_j(i, j, below) + geom.det_j(i, j, above))
}

/// `∂φ/∂ζ` averaged onto the x-face at `(i,j,k)`, the diamond stencil an
/// `h_xi` cross term needs (the columns either side of the face).
fn dphidz_at_x_face(phi: &Field3, i: i32, j: i32, k: i32, dz: f64) -> f64 {
    let d_here = (phi.get(i, j, k + 1) - phi.get(i, j, k - 1)) / (2.0 * dz);
    let d_west = (phi.get(i - 1, j, k + 1) - phi.get(i - 1, j, k - 1)) / (2.0 * dz);
    0.5 * (d_here + d_west)
}

fn dphidz_at_y_face(phi: &Field3, i: i32, j: i32, k: i32, dz: f64) -> f64 {
    let d_here = (phi.get(i, j, k + 1) - phi.get(i, j, k - 1)) / (2.0 * dz);
    let d_south = (phi.get(i, j - 1, k + 1) - phi.get(i, j - 1, k - 1)) / (2.0 * dz);
    0.5 * (d_here + d_south)
}

fn dphidx_at_z_face(phi: &Field3, i: i32, j: i32, k_hi: i32, dx: f64) -> f64 {
    let d_above = (phi.get(i + 1, j, k_hi) - phi.get(i - 1, j, k_hi)) / (2.0 * dx);
    let d_below = (phi.get(i + 1, j, k_hi - 1) - phi.get(i - 1, j, k_hi - 1)) / (2.0 * dx);
    0.5 * (d_above + d_below)
}

fn dphidy_at_z_face(phi: &Field3, i: i32, j: i32, k_hi: i32, dy: f64) -> f64 {
    let d_above = (phi.get(i, j + 1, k_hi) - phi.get(i, j - 1, k_hi)) / (2.0 * dy);
    let d_below = (phi.get(i, j + 1, k_hi - 1) - phi.get(i, j - 1, k_hi - 1)) / (2.0 * dy);
    0.5 * (d_above + d_below)
}

/// `∂φ/∂ζ` at the k-face between cells `k_hi - 1` and `k_hi`, applying the
/// BC-kind-keyed asymmetric stencil when that face sits on the physical
/// boundary.
fn vertical_face_gradient(
    phi: &Field3,
    i: i32,
    j: i32,
    k_hi: i32,
    dz: f64,
    alpha: f64,
    at_lo_boundary: bool,
    at_hi_boundary: bool,
    bc: &DiffusionBc,
) -> f64 {
    let k_lo = k_hi - 1;
    if at_lo_boundary {
        match bc.lo {
            VertFaceBc::Interior => (phi.get(i, j, k_hi) - phi.get(i, j, k_lo)) / dz,
            VertFaceBc::FoExtrap => {
                (-3.0 * phi.get(i, j, k_hi) + 4.0 * phi.get(i, j, k_hi + 1) - phi.get(i, j, k_hi + 2)) / (2.0 * dz)
            }
            VertFaceBc::PrescribedFlux => bc.flux_lo / alpha.max(1e-12),
        }
    } else if at_hi_boundary {
        match bc.hi {
            VertFaceBc::Interior => (phi.get(i, j, k_hi) - phi.get(i, j, k_lo)) / dz,
            VertFaceBc::FoExtrap => {
                (3.0 * phi.get(i, j, k_lo) - 4.0 * phi.get(i, j, k_lo - 1) + phi.get(i, j, k_lo - 2)) / (2.0 * dz)
            }
            VertFaceBc::PrescribedFlux => bc.flux_hi / alpha.max(1e-12),
        }
    } else {
        (phi.get(i, j, k_hi) - phi.get(i, j, k_lo)) / dz
    }
}

/// Assembles `∂_t(ρφ)_diffusion = ∇·((alpha_eff + mu_turb)·∇φ)` for one
/// scalar field, adding the result into `src` (additive, since diffusion
/// is called after advection has already written the flux-divergence
/// term for the same field). Under terrain, vertical k-face fluxes absorb
/// the `-(h_xi/h_zeta)*dphidz` / `-(h_eta/h_zeta)*dphidz` cross terms and
/// horizontal fluxes are multiplied by `h_zeta`, grounded in
/// `DiffusionSrcForState_T.cpp`'s metric terms.
pub fn diffusion_for_state(
    state: &BoxState,
    phi: &Field3,
    mu_turb: &Field3,
    geom: &Geometry,
    sc: &SolverChoice,
    bc: &DiffusionBc,
    src: &mut Field3,
) -> CoreResult<()> {
    let (lo, hi) = (state.valid.lo, state.valid.hi);
    let terrain = geom.has_terrain();
    for k in lo.2..=hi.2 {
        for j in lo.1..=hi.1 {
            for i in lo.0..=hi.0 {
                let rho = state.rho.get(i, j, k);
                let alpha = molecular_alpha(sc, rho) + mu_turb.get(i, j, k);

                let dphidx_lo = (phi.get(i, j, k) - phi.get(i - 1, j, k)) / geom.dx;
                let dphidx_hi = (phi.get(i + 1, j, k) - phi.get(i, j, k)) / geom.dx;
                let dphidy_lo = (phi.get(i, j, k) - phi.get(i, j - 1, k)) / geom.dy;
                let dphidy_hi = (phi.get(i, j + 1, k) - phi.get(i, j, k)) / geom.dy;

                let (xflux_lo, xflux_hi, yflux_lo, yflux_hi) = if terrain {
                    let hz_x_lo = h_zeta_x_face(geom, i, j, k);
                    let hz_x_hi = h_zeta_x_face(geom, i + 1, j, k);
                    let hxi_lo = met_xi(geom, i, j, k);
                    let hxi_hi = met_xi(geom, i + 1, j, k);
                    let dz_x_lo = dphidz_at_x_face(phi, i, j, k, geom.dz);
                    let dz_x_hi = dphidz_at_x_face(phi, i + 1, j, k, geom.dz);

                    let hz_y_lo = h_zeta_y_face(geom, i, j, k);
                    let hz_y_hi = h_zeta_y_face(geom, i, j + 1, k);
                    let heta_lo = met_eta(geom, i, j, k);
                    let heta_hi = met_eta(geom, i, j + 1, k);
                    let dz_y_lo = dphidz_at_y_face(phi, i, j, k, geom.dz);
                    let dz_y_hi = dphidz_at_y_face(phi, i, j + 1, k, geom.dz);

                    (
                        alpha * (hz_x_lo * dphidx_lo - hxi_lo * dz_x_lo),
                        alpha * (hz_x_hi * dphidx_hi - hxi_hi * dz_x_hi),
                        alpha * (hz_y_lo * dphidy_lo - heta_lo * dz_y_lo),
                        alpha * (hz_y_hi * dphidy_hi - heta_hi * dz_y_hi),
                    )
                } else {
                    (alpha * dphidx_lo, alpha * dphidx_hi, alpha * dphidy_lo, alpha * dphidy_hi)
                };

                let dphidz_lo = vertical_face_gradient(phi, i, j, k, geom.dz, alpha, k == lo.2, false, bc);
                let dphidz_hi = vertical_face_gradient(phi, i, j, k + 1, geom.dz, alpha, false, k == hi.2, bc);

                let (zflux_lo, zflux_hi) = if terrain {
                    let hz_z_lo = h_zeta_z_face(geom, i, j, k, lo.2, hi.2);
                    let hz_z_hi = h_zeta_z_face(geom, i, j, k + 1, lo.2, hi.2);
                    let hxi_z_lo = met_xi(geom, i, j, k);
                    let heta_z_lo = met_eta(geom, i, j, k);
                    let hxi_z_hi = met_xi(geom, i, j, k + 1);
                    let heta_z_hi = met_eta(geom, i, j, k + 1);
                    let cross_lo = alpha
                        * (hxi_z_lo * dphidx_at_z_face(phi, i, j, k, geom.dx)
                            + heta_z_lo * dphidy_at_z_face(phi, i, j, k, geom.dy));
                    let cross_hi = alpha
                        * (hxi_z_hi * dphidx_at_z_face(phi, i, j, k + 1, geom.dx)
                            + heta_z_hi * dphidy_at_z_face(phi, i, j, k + 1, geom.dy));
                    (
                        alpha * dphidz_lo / hz_z_lo.max(1e-12) - cross_lo,
                        alpha * dphidz_hi / hz_z_hi.max(1e-12) - cross_hi,
                    )
                } else {
                    (alpha * dphidz_lo, alpha * dphidz_hi)
                };

                let flux_x = (xflux_hi - xflux_lo) / geom.dx;
                let flux_y = (yflux_hi - yflux_lo) / geom.dy;
                let flux_z = (zflux_hi - zflux_lo) / geom.dz;

                let inv_det_j = 1.0 / geom.det_j(i, j, k);
                src.add(i, j, k, inv_det_j * (flux_x + flux_y + flux_z));
            }
        }
    }
    Ok(())
}

/// 6th-derivative-approximation hyperdiffusion, `nu6 = coeff/(2*dt)`, with
/// flux clipping so it never reinforces a gradient (monotone portion
/// only): fluxes whose sign matches the local gradient are zeroed.
pub fn numerical_diffusion(
    state: &BoxState,
    phi: &Field3,
    dt: f64,
    sc: &SolverChoice,
    geom: &Geometry,
    src: &mut Field3,
) -> CoreResult<()> {
    if !sc.use_num_diff || sc.num_diff_coeff <= 0.0 {
        return Ok(());
    }
    let nu6 = sc.num_diff_coeff / (2.0 * dt);
    let (lo, hi) = (state.valid.lo, state.valid.hi);
    for k in lo.2..=hi.2 {
        for j in lo.1..=hi.1 {
            for i in lo.0..=hi.0 {
                let d2 = |a: f64, b: f64, c: f64| a - 2.0 * b + c;
                let lap_xx = d2(
                    phi.get(i - 2, j, k) - 2.0 * phi.get(i - 1, j, k) + phi.get(i, j, k),
                    phi.get(i - 1, j, k) - 2.0 * phi.get(i, j, k) + phi.get(i + 1, j, k),
                    phi.get(i, j, k) - 2.0 * phi.get(i + 1, j, k) + phi.get(i + 2, j, k),
                );
                let grad_x = phi.get(i + 1, j, k) - phi.get(i - 1, j, k);
                let mut flux_x = -nu6 * lap_xx;
                if flux_x * grad_x > 0.0 {
                    flux_x = 0.0;
                }
                let inv_det_j = 1.0 / geom.det_j(i, j, k);
                src.add(i, j, k, inv_det_j * flux_x / (geom.dx * geom.dx));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverChoice;
    use crate::grid::{Box3, GhostWidths, Periodicity};

    #[test]
    fn diffusion_vanishes_on_uniform_field() {
        let valid = Box3::new((0, 0, 0), (3, 3, 3));
        let cons_ng = GhostWidths::uniform(3);
        let mom_ng = GhostWidths::uniform(2);
        let mut state = BoxState::new(valid, cons_ng, mom_ng);
        for k in -3..=6 {
            for j in -3..=6 {
                for i in -3..=6 {
                    state.rho.set(i, j, k, 1.0);
                    state.theta.set(i, j, k, 300.0);
                }
            }
        }
        let mut mu_turb = Field3::new(valid, cons_ng);
        mu_turb.fill(0.1);
        let geom = Geometry::flat(valid, 100.0, 100.0, 50.0, Periodicity { x: true, y: true });
        let sc = SolverChoice::default_validated();
        let mut src = Field3::new(valid, cons_ng);
        diffusion_for_state(&state, &state.theta, &mu_turb, &geom, &sc, &DiffusionBc::interior(), &mut src).unwrap();
        assert!(src.get(1, 1, 1).abs() < 1e-10);
    }

    #[test]
    fn diffusion_vanishes_on_uniform_field_with_terrain() {
        let valid = Box3::new((0, 0, 0), (3, 3, 3));
        let cons_ng = GhostWidths::uniform(3);
        let mut state = BoxState::new(valid, cons_ng, GhostWidths::uniform(2));
        for k in -3..=6 {
            for j in -3..=6 {
                for i in -3..=6 {
                    state.rho.set(i, j, k, 1.0);
                    state.theta.set(i, j, k, 300.0);
                }
            }
        }
        let mut mu_turb = Field3::new(valid, cons_ng);
        mu_turb.fill(0.1);
        let (nx_node, ny_node, nz_node) = (valid.nx() + 1, valid.ny() + 1, valid.nz() + 1);
        let mut z_nd = vec![0.0; (nx_node * ny_node * nz_node) as usize];
        for k in 0..nz_node {
            for j in 0..ny_node {
                for i in 0..nx_node {
                    let idx = ((k * ny_node + j) * nx_node + i) as usize;
                    z_nd[idx] = k as f64 * 50.0;
                }
            }
        }
        let geom = Geometry::with_terrain(valid, 100.0, 100.0, Periodicity { x: true, y: true }, z_nd).unwrap();
        let sc = SolverChoice::default_validated();
        let mut src = Field3::new(valid, cons_ng);
        diffusion_for_state(&state, &state.theta, &mu_turb, &geom, &sc, &DiffusionBc::interior(), &mut src).unwrap();
        assert!(src.get(1, 1, 1).abs() < 1e-8, "got {}", src.get(1, 1, 1));
    }

    #[test]
    fn fo_extrap_boundary_gives_nonzero_gradient_unlike_flat_ghost_copy() {
        // phi is flat-extrapolated into the ghost (ghost == interior cell),
        // so the plain two-point difference the `Interior` branch uses would
        // read back a spurious zero gradient at the boundary face even
        // though the interior field is not flat.
        let valid = Box3::new((0, 0, 0), (3, 3, 3));
        let ng = GhostWidths::uniform(3);
        let mut phi = Field3::new(valid, ng);
        for k in -3..=6 {
            for j in -3..=6 {
                for i in -3..=6 {
                    let kk = k.clamp(0, 3);
                    phi.set(i, j, k, kk as f64);
                }
            }
        }
        let bc = DiffusionBc { lo: VertFaceBc::FoExtrap, hi: VertFaceBc::Interior, flux_lo: 0.0, flux_hi: 0.0 };
        let g_fo = vertical_face_gradient(&phi, 1, 1, 0, 1.0, 1.0, true, false, &bc);
        let g_interior = vertical_face_gradient(&phi, 1, 1, 0, 1.0, 1.0, false, false, &DiffusionBc::interior());
        assert!(g_fo.abs() > 1e-10);
        assert!((g_fo - g_interior).abs() > 1e-10);
    }
}
