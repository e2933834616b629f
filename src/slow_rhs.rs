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

//! Slow RHS assembler: advection + diffusion + Coriolis + Rayleigh damping
//! + buoyancy + numerical diffusion, grounded in `TI_slow_rhs_fun.H`'s
//! `erf_slow_rhs_pre` / `erf_slow_rhs_post` pair.

use crate::advection::{advection_for_mom, advection_for_rho_and_theta, advection_for_scalars};
use crate::config::SolverChoice;
use crate::diffusion::les::eddy_viscosity;
use crate::diffusion::{diffusion_for_state, numerical_diffusion, DiffusionBc};
use crate::error::CoreResult;
use crate::grid::Geometry;
use crate::state::{AvgMomenta, BoxState, Field3};

/// All slow-RHS outputs for one box: one source field per conserved
/// scalar plus the three momentum components.
pub struct SlowRhs {
    pub rho: Field3,
    pub rho_theta: Field3,
    pub rho_ke: Field3,
    pub rho_qke: Field3,
    pub rho_scalar: Field3,
    pub x_mom: Field3,
    pub y_mom: Field3,
    pub z_mom: Field3,
}

impl SlowRhs {
    pub fn zeroed_like(state: &BoxState) -> Self {
        let mut rho = state.rho.clone();
        let mut rho_theta = state.rho_theta.clone();
        let mut rho_ke = state.rho_ke.clone();
        let mut rho_qke = state.rho_qke.clone();
        let mut rho_scalar = state.rho_scalar.clone();
        let mut x_mom = state.x_mom.clone();
        let mut y_mom = state.y_mom.clone();
        let mut z_mom = state.z_mom.clone();
        for f in [&mut rho, &mut rho_theta, &mut rho_ke, &mut rho_qke, &mut rho_scalar, &mut x_mom, &mut y_mom, &mut z_mom] {
            f.fill(0.0);
        }
        Self {
            rho,
            rho_theta,
            rho_ke,
            rho_qke,
            rho_scalar,
            x_mom,
            y_mom,
            z_mom,
        }
    }
}

/// Buoyancy contribution added to `rho_w`'s slow RHS. `buoyancy_type`
/// selects `-rho'*g` (1), `g*rho*theta'/theta_bar` (2), or the arithmetic
/// mean of the two (3), per the component contract's closed-form decision
/// for the unspecified blend. `sc.gravity` is already zeroed when
/// `use_gravity` was false, so no separate flag check is needed here.
fn buoyancy_term(rho: f64, rho0: f64, theta: f64, theta0: f64, sc: &SolverChoice) -> f64 {
    let rho_prime = rho - rho0;
    let term1 = -rho_prime * sc.gravity;
    let theta_prime = theta - theta0;
    let term2 = sc.gravity * rho * theta_prime / theta0.max(1e-6);
    match sc.buoyancy_type {
        1 => term1,
        2 => term2,
        _ => 0.5 * (term1 + term2),
    }
}

/// `erf_slow_rhs_pre`: the slow RHS evaluated before the acoustic substep
/// loop, covering every conserved field and all three momentum
/// components.
pub fn slow_rhs_pre(
    state: &BoxState,
    u: &Field3,
    v: &Field3,
    w: &Field3,
    geom: &Geometry,
    sc: &SolverChoice,
    dt: f64,
) -> CoreResult<(SlowRhs, AvgMomenta)> {
    let mut rhs = SlowRhs::zeroed_like(state);
    let mut avg = AvgMomenta::zeroed_like(state);

    advection_for_rho_and_theta(state, geom, sc, &mut rhs.rho, &mut rhs.rho_theta, &mut avg)?;
    advection_for_scalars(state, &state.ke, geom, sc, &avg, false, &mut rhs.rho_ke)?;
    advection_for_scalars(state, &state.qke, geom, sc, &avg, false, &mut rhs.rho_qke)?;
    advection_for_scalars(state, &state.scalar, geom, sc, &avg, true, &mut rhs.rho_scalar)?;
    advection_for_mom(state, u, v, w, geom, sc, &mut rhs.x_mom, &mut rhs.y_mom, &mut rhs.z_mom)?;

    let (lo, hi) = (state.valid.lo, state.valid.hi);
    let mut mu_turb = Field3::new(state.valid, state.cons_ng);
    for k in (lo.2 - state.cons_ng.nz)..=(hi.2 + state.cons_ng.nz) {
        for j in (lo.1 - state.cons_ng.ny)..=(hi.1 + state.cons_ng.ny) {
            for i in (lo.0 - state.cons_ng.nx)..=(hi.0 + state.cons_ng.nx) {
                mu_turb.set(i, j, k, eddy_viscosity(state, u, v, w, geom, sc, i, j, k));
            }
        }
    }
    let vert_bc = DiffusionBc::interior();
    diffusion_for_state(state, &state.theta, &mu_turb, geom, sc, &vert_bc, &mut rhs.rho_theta)?;
    diffusion_for_state(state, &state.ke, &mu_turb, geom, sc, &vert_bc, &mut rhs.rho_ke)?;
    diffusion_for_state(state, &state.scalar, &mu_turb, geom, sc, &vert_bc, &mut rhs.rho_scalar)?;

    numerical_diffusion(state, &state.theta, dt, sc, geom, &mut rhs.rho_theta)?;

    for k in lo.2..=hi.2 {
        for j in lo.1..=hi.1 {
            for i in lo.0..=hi.0 {
                let rho = state.rho.get(i, j, k);
                let rho0 = state.rho0.get(i, j, k);
                let theta = state.theta.get(i, j, k);
                let theta0 = if state.rho0.get(i, j, k) > 0.0 {
                    state.p0.get(i, j, k) / (rho0 * crate::config::R_D).max(1e-6)
                } else {
                    300.0
                };
                let buoy = buoyancy_term(rho, rho0, theta, theta0, sc);
                rhs.z_mom.add(i, j, k, buoy);
                if k == hi.2 {
                    rhs.z_mom.add(i, j, k + 1, buoy);
                }

                if sc.use_coriolis {
                    let u_here = 0.5 * (u.get(i, j, k) + u.get(i + 1, j, k));
                    let v_here = 0.5 * (v.get(i, j, k) + v.get(i, j + 1, k));
                    let w_here = 0.5 * (w.get(i, j, k) + w.get(i, j, k + 1));
                    let f = sc.coriolis_factor;
                    rhs.x_mom.add(i, j, k, f * (sc.cosphi * w_here - sc.sinphi * v_here) * rho);
                    rhs.y_mom.add(i, j, k, f * sc.sinphi * u_here * rho);
                }
            }
        }
    }

    if sc.use_terrain {
        for k in lo.2..=hi.2 {
            for j in lo.1..=hi.1 {
                for i in lo.0..=hi.0 {
                    let det_j = geom.det_j(i, j, k);
                    rhs.rho.set(i, j, k, rhs.rho.get(i, j, k) * det_j);
                    rhs.rho_theta.set(i, j, k, rhs.rho_theta.get(i, j, k) * det_j);
                }
            }
        }
    }

    Ok((rhs, avg))
}

/// `erf_slow_rhs_post`: re-evaluates the non-fast-variable slow sources
/// using the substep-averaged momenta, run once after the substep loop.
pub fn slow_rhs_post(
    state: &BoxState,
    geom: &Geometry,
    sc: &SolverChoice,
    avg: &AvgMomenta,
) -> CoreResult<SlowRhs> {
    let mut rhs = SlowRhs::zeroed_like(state);
    advection_for_scalars(state, &state.ke, geom, sc, avg, false, &mut rhs.rho_ke)?;
    advection_for_scalars(state, &state.qke, geom, sc, avg, false, &mut rhs.rho_qke)?;
    advection_for_scalars(state, &state.scalar, geom, sc, avg, true, &mut rhs.rho_scalar)?;
    Ok(rhs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Box3, GhostWidths, Periodicity};

    #[test]
    fn slow_rhs_pre_runs_on_quiescent_state() {
        let valid = Box3::new((0, 0, 0), (3, 3, 3));
        let cons_ng = GhostWidths::uniform(3);
        let mom_ng = GhostWidths::uniform(2);
        let mut state = BoxState::new(valid, cons_ng, mom_ng);
        for k in -3..=6 {
            for j in -3..=6 {
                for i in -3..=6 {
                    state.rho.set(i, j, k, 1.1);
                    state.theta.set(i, j, k, 300.0);
                    state.rho0.set(i, j, k, 1.1);
                    state.p0.set(i, j, k, 1.1 * crate::config::R_D * 300.0);
                    state.pi.set(i, j, k, 1.0);
                }
            }
        }
        let u = state.x_mom.clone();
        let v = state.y_mom.clone();
        let w = state.z_mom.clone();
        let geom = Geometry::flat(valid, 100.0, 100.0, 50.0, Periodicity { x: true, y: true });
        let sc = SolverChoice::default_validated();
        let (rhs, _avg) = slow_rhs_pre(&state, &u, &v, &w, &geom, &sc, 1.0).unwrap();
        assert!(rhs.rho.get(1, 1, 1).abs() < 1e-8);
    }
}
