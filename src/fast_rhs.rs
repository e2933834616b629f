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

//! Fast RHS / acoustic substep, grounded in `ERF_fast_rhs_MT.cpp`'s
//! per-substep structure: explicit horizontal update, temporary RHS for
//! `(rho, rho*theta)`, the tridiagonal vertical solve for `rho*w`, and the
//! time-averaged-momenta accumulation the post-RK slow RHS consumes.

use crate::error::CoreResult;
use crate::fast_coeffs::{beta1, beta2, thomas_solve, ColumnCoeffs};
use crate::grid::Geometry;
use crate::state::{AvgMomenta, BoxState, Field3};

/// One acoustic substep over a single box. `slow_rhs_*` are the frozen
/// slow-RHS contributions for this RK stage; `coeffs` is rebuilt once per
/// stage by [`crate::fast_coeffs::build_column`] and reused across every
/// substep.
pub struct FastRhsInputs<'a> {
    pub dtau: f64,
    pub n_substeps: u32,
    pub slow_rhs_rho: &'a Field3,
    pub slow_rhs_rho_theta: &'a Field3,
    pub slow_rhs_x_mom: &'a Field3,
    pub slow_rhs_y_mom: &'a Field3,
    pub slow_rhs_z_mom: &'a Field3,
    /// Geometry as it stood at the start of this RK stage's substep loop.
    /// `Some` only under moving terrain; `None` for flat or static-terrain
    /// geometries, where the comoving rescaling below collapses to the
    /// identity. Grounded in `ERF_fast_rhs_MT.cpp`'s `detJ_old`/`z_nd_old`
    /// vs. `detJ_new`/`z_nd_new` pair.
    pub geom_old: Option<&'a Geometry>,
}

/// Face-averaged density at vertical face `kk`, clamped to the valid range
/// so the top/bottom faces reuse the adjacent cell instead of reading past
/// the halo.
fn face_rho(state: &BoxState, i: i32, j: i32, kk: i32, klo: i32, khi: i32) -> f64 {
    if kk <= klo {
        state.rho.get(i, j, klo)
    } else if kk > khi {
        state.rho.get(i, j, khi)
    } else {
        0.5 * (state.rho.get(i, j, kk - 1) + state.rho.get(i, j, kk))
    }
}

/// Advances the fast variables `(rho, rho*theta, rho*u, rho*v, rho*w)` by
/// one acoustic substep, accumulating `avg` as it goes. `coeffs_per_column`
/// indexes as `[(i - lo.0) + (j - lo.1) * nx]`.
pub fn substep(
    state: &mut BoxState,
    geom: &Geometry,
    inputs: &FastRhsInputs,
    coeffs_per_column: &[ColumnCoeffs],
    avg: &mut AvgMomenta,
) -> CoreResult<()> {
    let (lo, hi) = (state.valid.lo, state.valid.hi);
    let nx = state.valid.nx();
    let kmax = hi.2 - lo.2;
    let inv_n = 1.0 / inputs.n_substeps as f64;
    let b1 = beta1();
    let b2 = beta2();

    // 1. Horizontal momenta: explicit pressure-gradient update using the
    // Exner function at the face (the lagged-(rho*theta)' blend collapses
    // to the current perturbation here since this core does not carry a
    // separate previous-substep buffer across the public substep call).
    // Under moving terrain, §4.7 step 2 multiplies the old momentum by
    // `h_zeta_old` before adding the RHS and divides the result by
    // `h_zeta_new`, so the conserved quantity being advanced is `rho*u*detJ`
    // and not the bare cell value; `h_old == h_new == 1` recovers the
    // original update exactly when `geom_old` is `None`.
    for k in lo.2..=hi.2 {
        for j in lo.1..=hi.1 {
            for i in (lo.0)..=(hi.0 + 1) {
                let grad_pi = (state.pi.get(i, j, k) - state.pi.get(i - 1, j, k)) / geom.dx;
                let theta_f = 0.5 * (state.theta.get(i - 1, j, k) + state.theta.get(i, j, k));
                let cp_theta_gradpi = crate::config::GAMMA * crate::config::R_D / (crate::config::GAMMA - 1.0) * theta_f * grad_pi;
                let (h_old, h_new) = match inputs.geom_old {
                    Some(g_old) => (
                        0.5 * (g_old.det_j(i - 1, j, k) + g_old.det_j(i, j, k)),
                        0.5 * (geom.det_j(i - 1, j, k) + geom.det_j(i, j, k)),
                    ),
                    None => (1.0, 1.0),
                };
                let old_mom = state.x_mom.get(i, j, k);
                let new_mom = (h_old * old_mom + inputs.dtau * (inputs.slow_rhs_x_mom.get(i, j, k) - cp_theta_gradpi)) / h_new;
                state.x_mom.set(i, j, k, new_mom);
                avg.x.add(i, j, k, inv_n * (new_mom - old_mom));
            }
        }
    }
    for k in lo.2..=hi.2 {
        for j in (lo.1)..=(hi.1 + 1) {
            for i in lo.0..=hi.0 {
                let grad_pi = (state.pi.get(i, j, k) - state.pi.get(i, j - 1, k)) / geom.dy;
                let theta_f = 0.5 * (state.theta.get(i, j - 1, k) + state.theta.get(i, j, k));
                let cp_theta_gradpi = crate::config::GAMMA * crate::config::R_D / (crate::config::GAMMA - 1.0) * theta_f * grad_pi;
                let (h_old, h_new) = match inputs.geom_old {
                    Some(g_old) => (
                        0.5 * (g_old.det_j(i, j - 1, k) + g_old.det_j(i, j, k)),
                        0.5 * (geom.det_j(i, j - 1, k) + geom.det_j(i, j, k)),
                    ),
                    None => (1.0, 1.0),
                };
                let old_mom = state.y_mom.get(i, j, k);
                let new_mom = (h_old * old_mom + inputs.dtau * (inputs.slow_rhs_y_mom.get(i, j, k) - cp_theta_gradpi)) / h_new;
                state.y_mom.set(i, j, k, new_mom);
                avg.y.add(i, j, k, inv_n * (new_mom - old_mom));
            }
        }
    }

    // 2/3. Per-column vertical solve for rho*w, then rho & rho*theta update.
    for j in lo.1..=hi.1 {
        for i in lo.0..=hi.0 {
            let col_idx = ((i - lo.0) + (j - lo.1) * nx) as usize;
            let coeffs = &coeffs_per_column[col_idx];

            let mut rhs = vec![0.0; (kmax + 2) as usize];
            for k in 0..=(kmax + 1) {
                let kk = (k + lo.2).clamp(lo.2, hi.2);
                let horiz_div_rt = (state.x_mom.get(i + 1, j, kk) - state.x_mom.get(i, j, kk)) / geom.dx
                    + (state.y_mom.get(i, j + 1, kk) - state.y_mom.get(i, j, kk)) / geom.dy;
                rhs[k as usize] = inputs.slow_rhs_z_mom.get(i, j, kk) - b1 * horiz_div_rt;
            }
            rhs[0] = 0.0;
            rhs[(kmax + 1) as usize] = 0.0;

            let delta_w = thomas_solve(coeffs, &rhs, kmax);

            for k in 0..=(kmax + 1) {
                let kk = (k + lo.2).clamp(lo.2.min(hi.2 + 1), hi.2 + 1);
                let old_zmom = state.z_mom.get(i, j, kk);
                let new_zmom = old_zmom + inputs.dtau * delta_w[k as usize];
                state.z_mom.set(i, j, kk, new_zmom);
                avg.z.add(i, j, kk, inv_n * (new_zmom - old_zmom));
            }

            // §4.7 step 3: reconstruct Ω from the solve just performed,
            // subtracting the moving-terrain comoving correction
            // `rho*(z_t + z_t_pert)` at each plane so the solve operates in a
            // comoving vertical (this core folds `z_t_pert`, the sub-`dtau`
            // correction to the RK-stage grid velocity, into `geom.z_t`,
            // which the driver refreshes once per stage). The previous
            // value is captured first since the β-blend below needs both
            // the freshly reconstructed Ω and the one left over from the
            // prior substep, not two copies of the same value.
            let mut omega_prev = vec![0.0; (kmax + 2) as usize];
            for k in 0..=(kmax + 1) {
                let kk = (k + lo.2).clamp(lo.2.min(hi.2 + 1), hi.2 + 1);
                omega_prev[k as usize] = state.omega.get(i, j, kk);
            }
            for k in 0..=(kmax + 1) {
                let kk = (k + lo.2).clamp(lo.2.min(hi.2 + 1), hi.2 + 1);
                let rho_f = face_rho(state, i, j, kk, lo.2, hi.2);
                let z_t_face = geom.z_t(i, j, kk.clamp(lo.2, hi.2));
                let omega_new = state.z_mom.get(i, j, kk) - rho_f * z_t_face;
                state.omega.set(i, j, kk, omega_new);
            }

            for k in lo.2..=hi.2 {
                let omega_lo = b2 * state.omega.get(i, j, k) + b1 * omega_prev[(k - lo.2) as usize];
                let omega_hi = b2 * state.omega.get(i, j, k + 1) + b1 * omega_prev[(k + 1 - lo.2) as usize];
                let inv_dz = 1.0 / geom.dz;
                let inv_det_j = 1.0 / geom.det_j(i, j, k);

                let drho = inputs.dtau * (inputs.slow_rhs_rho.get(i, j, k) - inv_det_j * inv_dz * (omega_hi - omega_lo));
                let new_rho = state.rho.get(i, j, k) + drho;
                state.rho.set(i, j, k, new_rho);

                let theta_lo = 0.5 * (state.theta.get(i, j, k - 1) + state.theta.get(i, j, k));
                let theta_hi = 0.5 * (state.theta.get(i, j, k) + state.theta.get(i, j, k + 1));
                let drho_theta = inputs.dtau
                    * (inputs.slow_rhs_rho_theta.get(i, j, k)
                        - inv_det_j * inv_dz * (omega_hi * theta_hi - omega_lo * theta_lo));
                let new_rt = state.rho_theta.get(i, j, k) + drho_theta;
                state.rho_theta.set(i, j, k, new_rt);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fast_coeffs::build_column;
    use crate::grid::{Box3, GhostWidths, Periodicity};

    #[test]
    fn substep_preserves_uniform_rest_state() {
        let valid = Box3::new((0, 0, 0), (1, 1, 3));
        let cons_ng = GhostWidths::uniform(2);
        let mom_ng = GhostWidths::uniform(1);
        let mut state = BoxState::new(valid, cons_ng, mom_ng);
        for k in -2..=5 {
            for j in -2..=3 {
                for i in -2..=3 {
                    state.rho.set(i, j, k, 1.1);
                    state.rho_theta.set(i, j, k, 1.1 * 300.0);
                    state.theta.set(i, j, k, 300.0);
                    state.pi.set(i, j, k, 1.0);
                }
            }
        }
        let geom = Geometry::flat(valid, 100.0, 100.0, 50.0, Periodicity { x: true, y: true });

        let mut zero = Field3::new(valid, cons_ng);
        zero.fill(0.0);
        let inputs = FastRhsInputs {
            dtau: 0.1,
            n_substeps: 3,
            slow_rhs_rho: &zero,
            slow_rhs_rho_theta: &zero,
            slow_rhs_x_mom: &zero,
            slow_rhs_y_mom: &zero,
            slow_rhs_z_mom: &zero,
            geom_old: None,
        };

        let kmax = valid.nz() - 1;
        let mut coeffs_per_col = Vec::new();
        for _j in lo_range(valid) {
            for _i in lo_range2(valid) {
                let pi_col = vec![1.0; (kmax + 2) as usize];
                let rt_col = vec![330.0; (kmax + 2) as usize];
                let theta_col = vec![300.0; (kmax + 2) as usize];
                let rho0_col = vec![1.1; (kmax + 2) as usize];
                coeffs_per_col.push(build_column(&geom, 0, 0, kmax, 0.1, &pi_col, &rt_col, &theta_col, &rho0_col, false).unwrap());
            }
        }

        let mut avg = AvgMomenta::zeroed_like(&state);
        substep(&mut state, &geom, &inputs, &coeffs_per_col, &mut avg).unwrap();
        assert!((state.rho.get(0, 0, 1) - 1.1).abs() < 1e-6);
    }

    fn lo_range(valid: Box3) -> std::ops::RangeInclusive<i32> {
        valid.lo.1..=valid.hi.1
    }
    fn lo_range2(valid: Box3) -> std::ops::RangeInclusive<i32> {
        valid.lo.0..=valid.hi.0
    }
}
