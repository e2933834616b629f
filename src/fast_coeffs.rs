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

//! Tridiagonal coefficient builder for the vertical acoustic solve, one
//! per `(i,j)` column, grounded in `ERF_make_fast_coeffs.cpp`'s two-pass
//! structure: forward elimination (computing the running pivot and `gam`)
//! followed by a separate diagonal-inversion pass, reused across every
//! acoustic substep within an RK stage.

use crate::config::{GAMMA, R_D};
use crate::error::{CoreError, CoreResult};
use crate::grid::Geometry;

/// `beta_s` selects explicit (-1) through implicit (+1); the default of
/// 0.1 gives a semi-implicit scheme.
pub const BETA_S: f64 = 0.1;

pub fn beta2() -> f64 {
    0.5 * (1.0 + BETA_S)
}

pub fn beta1() -> f64 {
    1.0 - beta2()
}

/// One column's worth of tridiagonal coefficients, `k in [0, kmax+1]`.
pub struct ColumnCoeffs {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub c: Vec<f64>,
    /// Scratch used by the Thomas forward-elimination pass; stored here so
    /// the substep loop doesn't reallocate it every acoustic step.
    pub gam: Vec<f64>,
}

impl ColumnCoeffs {
    pub fn new(kmax: usize) -> Self {
        Self {
            a: vec![0.0; kmax + 2],
            b: vec![0.0; kmax + 2],
            c: vec![0.0; kmax + 2],
            gam: vec![0.0; kmax + 2],
        }
    }
}

/// Builds the tridiagonal system for one `(i,j)` column at the given RK
/// stage, using the stage's `pi`, `rho_theta`, and base-state profiles.
/// `dtau` is the acoustic substep, `terrain` selects the `J_face`-weighted
/// form of `B_k`.
pub fn build_column(
    geom: &Geometry,
    i: i32,
    j: i32,
    kmax: i32,
    dtau: f64,
    pi_col: &[f64],
    rho_theta_col: &[f64],
    theta_col: &[f64],
    rho0_col: &[f64],
    terrain: bool,
) -> CoreResult<ColumnCoeffs> {
    let mut coeffs = ColumnCoeffs::new(kmax as usize);
    let rd_o_cv = R_D / (GAMMA - 1.0); // c_v = R_d/(gamma-1)
    let dz_inv = 1.0 / geom.dz;
    let d = dtau * dtau * beta2() * beta2() * dz_inv;

    // Boundary rows: no flow through ground / model top.
    coeffs.a[0] = 0.0;
    coeffs.b[0] = 1.0;
    coeffs.c[0] = 0.0;
    coeffs.a[(kmax + 1) as usize] = 0.0;
    coeffs.b[(kmax + 1) as usize] = 1.0;
    coeffs.c[(kmax + 1) as usize] = 0.0;

    for k in 1..=kmax {
        let kk = k as usize;
        let j_face = if terrain {
            0.5 * (geom.det_j(i, j, (k - 1).max(0)) + geom.det_j(i, j, k.min(kmax - 1)))
        } else {
            1.0
        };

        let pi_c = 0.5 * (pi_col[kk - 1] + pi_col[kk]);
        let coeff_p = GAMMA * R_D * pi_c * dz_inv / j_face
            + crate::config::GRAVITY * R_D * rho0_col[kk] * pi_col[kk] / (rd_o_cv * pi_col[kk].max(1e-12) * rho_theta_col[kk].max(1e-12));
        let coeff_q = GAMMA * R_D * pi_c * dz_inv / j_face
            + crate::config::GRAVITY * R_D * rho0_col[kk - 1] * pi_col[kk - 1]
                / (rd_o_cv * pi_col[kk - 1].max(1e-12) * rho_theta_col[kk - 1].max(1e-12));

        let theta_km_half = 0.5 * (theta_col[kk - 1] + theta_col[kk]);
        let theta_kp_half = if kk + 1 < theta_col.len() {
            0.5 * (theta_col[kk] + theta_col[kk + 1])
        } else {
            theta_col[kk]
        };

        coeffs.a[kk] = d * (crate::config::GRAVITY / 2.0 - coeff_q * theta_km_half);
        coeffs.c[kk] = d * (-crate::config::GRAVITY / 2.0 + coeff_p * theta_kp_half);
        let base = if terrain { j_face } else { 1.0 };
        coeffs.b[kk] = base + d * (coeff_q - coeff_p) * theta_col[kk];
    }

    forward_eliminate(&mut coeffs, kmax)?;
    invert_diagonal(&mut coeffs, kmax);
    Ok(coeffs)
}

/// First pass: forward elimination, computing `gam` and the running pivot
/// in `b`. Kept separate from [`invert_diagonal`] to match the donor's
/// two-loop structure (elimination, then invert).
fn forward_eliminate(coeffs: &mut ColumnCoeffs, kmax: i32) -> CoreResult<()> {
    let mut bet = coeffs.b[0];
    if bet.abs() < 1e-300 {
        return Err(CoreError::NumericalFailure {
            where_: "fast_coeffs::forward_eliminate".into(),
            detail: "zero pivot at k=0".into(),
        });
    }
    for k in 1..=(kmax + 1) as usize {
        coeffs.gam[k] = coeffs.c[k - 1] / bet;
        bet = coeffs.b[k] - coeffs.a[k] * coeffs.gam[k];
        if bet.abs() < 1e-300 {
            return Err(CoreError::NumericalFailure {
                where_: "fast_coeffs::forward_eliminate".into(),
                detail: format!("zero pivot at k={}", k),
            });
        }
        coeffs.b[k] = bet;
    }
    Ok(())
}

/// Second pass: inverts the diagonal once so every acoustic substep can
/// reuse `1/b_k` directly rather than dividing each time.
fn invert_diagonal(coeffs: &mut ColumnCoeffs, kmax: i32) {
    for k in 0..=(kmax + 1) as usize {
        coeffs.b[k] = 1.0 / coeffs.b[k];
    }
}

/// Solves `A*x_{k-1} + x_k/B + C*x_{k+1} = rhs_k` given the precomputed,
/// diagonal-inverted coefficients, via the standard Thomas back/forward
/// substitution using the stored `gam` scratch.
pub fn thomas_solve(coeffs: &ColumnCoeffs, rhs: &[f64], kmax: i32) -> Vec<f64> {
    let n = (kmax + 2) as usize;
    let mut x = vec![0.0; n];
    x[0] = rhs[0] * coeffs.b[0];
    for k in 1..n {
        x[k] = (rhs[k] - coeffs.a[k] * x[k - 1]) * coeffs.b[k];
    }
    for k in (0..n - 1).rev() {
        x[k] -= coeffs.gam[k + 1] * x[k + 1];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Box3, Periodicity};

    #[test]
    fn beta_weights_sum_to_one() {
        assert!((beta1() + beta2() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn thomas_solve_recovers_identity_system() {
        let kmax = 4;
        let mut coeffs = ColumnCoeffs::new(kmax as usize);
        for k in 0..=(kmax + 1) as usize {
            coeffs.a[k] = 0.0;
            coeffs.b[k] = 1.0;
            coeffs.c[k] = 0.0;
        }
        forward_eliminate(&mut coeffs, kmax).unwrap();
        invert_diagonal(&mut coeffs, kmax);
        let rhs = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let x = thomas_solve(&coeffs, &rhs, kmax);
        for (a, b) in x.iter().zip(rhs.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn build_column_produces_dirichlet_boundary_rows() {
        let geom = Geometry::flat(Box3::new((0, 0, 0), (1, 1, 4)), 100.0, 100.0, 50.0, Periodicity::default());
        let kmax = 4;
        let pi_col = vec![1.0; (kmax + 2) as usize];
        let rt_col = vec![300.0; (kmax + 2) as usize];
        let theta_col = vec![300.0; (kmax + 2) as usize];
        let rho0_col = vec![1.1; (kmax + 2) as usize];
        let coeffs = build_column(&geom, 0, 0, kmax, 0.5, &pi_col, &rt_col, &theta_col, &rho0_col, false).unwrap();
        assert_eq!(coeffs.a[0], 0.0);
        assert_eq!(coeffs.c[0], 0.0);
    }
}
