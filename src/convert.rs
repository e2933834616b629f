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

//! Momentum <-> velocity conversion and the ghost-cell fill ordering
//! contract, plus the `GhostExchange` collaborator seam that stands in for
//! the out-of-scope mesh/AMR manager.
//!
//! The four-step ordering (fill rho ghosts, convert valid-face
//! momentum->velocity, fill velocity ghosts, convert full-halo
//! velocity->momentum) is the sole contract the rest of the integrator
//! expects from this module; violating it leaves `rho*u` inconsistent in
//! ghost regions.

use crate::boundary::lateral::{fill_ghost, BcKind};
use crate::error::CoreResult;
use crate::state::{BoxState, Field3};

/// Narrow seam standing in for the mesh/AMR manager's four external
/// operations (`interp`, `fillpatch`, `average_down`, `reflux`). A
/// production implementation lives outside this core; [`LocalGhostExchange`]
/// is a deterministic single-box test double sufficient to exercise the
/// glue and the MRI driver end to end.
pub trait GhostExchange {
    /// Interpolates fine-level faces from coarse-level faces at a
    /// coarse-fine boundary. A single-box implementation is a no-op.
    fn interp(&self, _fine_faces: &mut Field3, _component: usize, _count: usize) {}

    /// Fills `field`'s ghost region from (1) a coarser level, (2) the
    /// physical boundary, (3) same-level neighbors -- in that priority
    /// order.
    fn fillpatch(&self, field: &mut Field3, ng: i32, bc: BcKind, dirichlet_value: f64);

    /// Restricts a finer level's data down onto this level for
    /// conservation after a step. A single-box implementation is a no-op.
    fn average_down(&self, _finer: &Field3, _coarser: &mut Field3, _component_range: std::ops::Range<usize>) {}

    /// Applies the flux-register correction at stage end under
    /// refinement. A single-box implementation is a no-op.
    fn reflux(&self, _sign: f64) {}
}

/// Single-box, no-refinement `GhostExchange`: periodic or solid-wall only,
/// enough to drive the fill-patch glue and MRI driver in tests without a
/// real multi-box/multi-level mesh manager.
pub struct LocalGhostExchange {
    pub periodic_x: bool,
    pub periodic_y: bool,
}

impl GhostExchange for LocalGhostExchange {
    fn fillpatch(&self, field: &mut Field3, ng: i32, bc: BcKind, dirichlet_value: f64) {
        let (lo, hi) = (field.lo(), field.hi());
        let valid_lo = (lo.0 + ng, lo.1 + ng, lo.2 + ng);
        let valid_hi = (hi.0 - ng, hi.1 - ng, hi.2 - ng);
        let kind = if self.periodic_x { BcKind::Periodic } else { bc };

        for k in valid_lo.2..=valid_hi.2 {
            for j in valid_lo.1..=valid_hi.1 {
                for g in 1..=ng {
                    let (ii_lo, ii_hi) = if self.periodic_x {
                        (valid_hi.0 - g + 1, valid_lo.0 + g - 1)
                    } else {
                        (valid_lo.0 + g - 1, valid_hi.0 - g + 1)
                    };
                    fill_ghost(field, valid_lo.0 - g, j, k, ii_lo, j, k, kind, dirichlet_value);
                    fill_ghost(field, valid_hi.0 + g, j, k, ii_hi, j, k, kind, dirichlet_value);
                }
            }
        }

        let kind_y = if self.periodic_y { BcKind::Periodic } else { bc };
        for k in valid_lo.2..=valid_hi.2 {
            for i in lo.0..=hi.0 {
                for g in 1..=ng {
                    let (ji_lo, ji_hi) = if self.periodic_y {
                        (valid_hi.1 - g + 1, valid_lo.1 + g - 1)
                    } else {
                        (valid_lo.1 + g - 1, valid_hi.1 - g + 1)
                    };
                    fill_ghost(field, i, valid_lo.1 - g, k, i, ji_lo, k, kind_y, dirichlet_value);
                    fill_ghost(field, i, valid_hi.1 + g, k, i, ji_hi, k, kind_y, dirichlet_value);
                }
            }
        }
    }
}

/// Cell-centered density averaged onto the face between `(i-1,j,k)` and
/// `(i,j,k)` along `axis` (0=x, 1=y, 2=z).
fn rho_face(rho: &Field3, axis: usize, i: i32, j: i32, k: i32) -> f64 {
    let (lo, hi) = match axis {
        0 => (rho.get(i - 1, j, k), rho.get(i, j, k)),
        1 => (rho.get(i, j - 1, k), rho.get(i, j, k)),
        _ => (rho.get(i, j, k - 1), rho.get(i, j, k)),
    };
    0.5 * (lo + hi)
}

/// Step 2/4 of the fill-patch glue: converts valid-face momentum to
/// velocity (`u_f = rho*u_f / rho_bar_f`) or the inverse, over the region
/// `(lo..=hi)` of the face's own index space.
pub fn momentum_to_velocity(rho: &Field3, mom: &Field3, vel: &mut Field3, axis: usize, lo: (i32, i32, i32), hi: (i32, i32, i32)) {
    for k in lo.2..=hi.2 {
        for j in lo.1..=hi.1 {
            for i in lo.0..=hi.0 {
                let rbar = rho_face(rho, axis, i, j, k).max(1e-12);
                vel.set(i, j, k, mom.get(i, j, k) / rbar);
            }
        }
    }
}

pub fn velocity_to_momentum(rho: &Field3, vel: &Field3, mom: &mut Field3, axis: usize, lo: (i32, i32, i32), hi: (i32, i32, i32)) {
    for k in lo.2..=hi.2 {
        for j in lo.1..=hi.1 {
            for i in lo.0..=hi.0 {
                let rbar = rho_face(rho, axis, i, j, k);
                mom.set(i, j, k, rbar * vel.get(i, j, k));
            }
        }
    }
}

/// Runs the full four-step ordering over one box's velocity scratch
/// fields, delegating ghost fills to `exch`.
pub fn convert_and_fill(
    state: &mut BoxState,
    u: &mut Field3,
    v: &mut Field3,
    w: &mut Field3,
    exch: &dyn GhostExchange,
    vel_ng: i32,
) -> CoreResult<()> {
    let rho_ng = state.rho.ghost_widths();
    exch.fillpatch(&mut state.rho, rho_ng.nx.min(rho_ng.ny).min(rho_ng.nz) - 1, BcKind::FoExtrap, 0.0);

    momentum_to_velocity(&state.rho, &state.x_mom, u, 0, state.x_mom.lo(), state.x_mom.hi());
    momentum_to_velocity(&state.rho, &state.y_mom, v, 1, state.y_mom.lo(), state.y_mom.hi());
    momentum_to_velocity(&state.rho, &state.z_mom, w, 2, state.z_mom.lo(), state.z_mom.hi());

    exch.fillpatch(u, vel_ng, BcKind::ExtDir, 0.0);
    exch.fillpatch(v, vel_ng, BcKind::ExtDir, 0.0);
    exch.fillpatch(w, vel_ng, BcKind::Reflect, 0.0);

    velocity_to_momentum(&state.rho, u, &mut state.x_mom, 0, u.lo(), u.hi());
    velocity_to_momentum(&state.rho, v, &mut state.y_mom, 1, v.lo(), v.hi());
    velocity_to_momentum(&state.rho, w, &mut state.z_mom, 2, w.lo(), w.hi());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Box3, GhostWidths};

    #[test]
    fn momentum_velocity_roundtrip_is_consistent() {
        let valid = Box3::new((0, 0, 0), (3, 3, 3));
        let mut state = BoxState::new(valid, GhostWidths::uniform(3), GhostWidths::uniform(2));
        for k in -3..=6 {
            for j in -3..=6 {
                for i in -3..=6 {
                    state.rho.set(i, j, k, 1.2);
                }
            }
        }
        for k in 0..=3 {
            for j in 0..=3 {
                for i in 0..=4 {
                    state.x_mom.set(i, j, k, 6.0);
                }
            }
        }
        let mut u = state.x_mom.clone();
        momentum_to_velocity(&state.rho, &state.x_mom, &mut u, 0, (0, 0, 0), (4, 3, 3));
        assert!((u.get(2, 1, 1) - 5.0).abs() < 1e-10);

        let mut mom_back = state.x_mom.clone();
        velocity_to_momentum(&state.rho, &u, &mut mom_back, 0, (0, 0, 0), (4, 3, 3));
        assert!((mom_back.get(2, 1, 1) - 6.0).abs() < 1e-10);
    }
}
