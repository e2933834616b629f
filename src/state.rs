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

//! State store: cell-centered conserved variables, face-centered momenta,
//! and the scratch fields (primitives, Exner, Ω) the RHS kernels read and
//! write. One box's worth of state lives in a [`BoxState`]; indices are
//! absolute grid indices offset internally by the ghost width.

use crate::grid::{Box3, GhostWidths};

/// Index of a scalar field within the cell-centered conserved array, in
/// the order the data model table lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsVar {
    Rho = 0,
    RhoTheta = 1,
    RhoKE = 2,
    RhoQKE = 3,
    RhoScalar = 4,
}

pub const NUM_CONS_BASE: usize = 5;

/// A single 3-D array addressed by absolute grid index with a uniform
/// ghost halo; the flattened storage backing every field in [`BoxState`].
#[derive(Debug)]
pub struct Field3 {
    lo: (i32, i32, i32),
    hi: (i32, i32, i32),
    ng: GhostWidths,
    data: Vec<f64>,
    stride_y: usize,
    stride_z: usize,
}

impl Field3 {
    pub fn new(valid: Box3, ng: GhostWidths) -> Self {
        let lo = (valid.lo.0 - ng.nx, valid.lo.1 - ng.ny, valid.lo.2 - ng.nz);
        let hi = (valid.hi.0 + ng.nx, valid.hi.1 + ng.ny, valid.hi.2 + ng.nz);
        let nx = (hi.0 - lo.0 + 1) as usize;
        let ny = (hi.1 - lo.1 + 1) as usize;
        let nz = (hi.2 - lo.2 + 1) as usize;
        Self {
            lo,
            hi,
            ng,
            data: vec![0.0; nx * ny * nz],
            stride_y: nx,
            stride_z: nx * ny,
        }
    }

    #[inline(always)]
    fn idx(&self, i: i32, j: i32, k: i32) -> usize {
        debug_assert!(i >= self.lo.0 && i <= self.hi.0, "x index {} out of [{}, {}]", i, self.lo.0, self.hi.0);
        debug_assert!(j >= self.lo.1 && j <= self.hi.1, "y index {} out of [{}, {}]", j, self.lo.1, self.hi.1);
        debug_assert!(k >= self.lo.2 && k <= self.hi.2, "z index {} out of [{}, {}]", k, self.lo.2, self.hi.2);
        let ii = (i - self.lo.0) as usize;
        let jj = (j - self.lo.1) as usize;
        let kk = (k - self.lo.2) as usize;
        kk * self.stride_z + jj * self.stride_y + ii
    }

    #[inline(always)]
    pub fn get(&self, i: i32, j: i32, k: i32) -> f64 {
        self.data[self.idx(i, j, k)]
    }

    #[inline(always)]
    pub fn set(&mut self, i: i32, j: i32, k: i32, v: f64) {
        let idx = self.idx(i, j, k);
        self.data[idx] = v;
    }

    #[inline(always)]
    pub fn add(&mut self, i: i32, j: i32, k: i32, v: f64) {
        let idx = self.idx(i, j, k);
        self.data[idx] += v;
    }

    pub fn fill(&mut self, v: f64) {
        self.data.iter_mut().for_each(|x| *x = v);
    }

    pub fn ghost_widths(&self) -> GhostWidths {
        self.ng
    }

    pub fn lo(&self) -> (i32, i32, i32) {
        self.lo
    }

    pub fn hi(&self) -> (i32, i32, i32) {
        self.hi
    }

    pub fn clone_from(&mut self, other: &Field3) {
        self.data.copy_from_slice(&other.data);
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

/// Full per-box state: conserved cell variables, face momenta, and the
/// scratch/derived fields the RHS kernels need. Owns exactly the fields
/// listed in the data model table plus the auxiliary quantities the
/// component contracts name (`π`, `Ω`, primitives, base state).
pub struct BoxState {
    pub valid: Box3,
    pub cons_ng: GhostWidths,
    pub mom_ng: GhostWidths,

    pub rho: Field3,
    pub rho_theta: Field3,
    pub rho_ke: Field3,
    pub rho_qke: Field3,
    pub rho_scalar: Field3,

    pub x_mom: Field3,
    pub y_mom: Field3,
    pub z_mom: Field3,

    pub theta: Field3,
    pub ke: Field3,
    pub qke: Field3,
    pub scalar: Field3,

    pub omega: Field3,

    pub pi: Field3,

    pub rho0: Field3,
    pub p0: Field3,
    pub pi0: Field3,
}

impl BoxState {
    pub fn new(valid: Box3, cons_ng: GhostWidths, mom_ng: GhostWidths) -> Self {
        let face_box = |axis: usize| {
            let mut hi = valid.hi;
            match axis {
                0 => hi.0 += 1,
                1 => hi.1 += 1,
                _ => hi.2 += 1,
            }
            Box3::new(valid.lo, hi)
        };
        Self {
            valid,
            cons_ng,
            mom_ng,
            rho: Field3::new(valid, cons_ng),
            rho_theta: Field3::new(valid, cons_ng),
            rho_ke: Field3::new(valid, cons_ng),
            rho_qke: Field3::new(valid, cons_ng),
            rho_scalar: Field3::new(valid, cons_ng),
            x_mom: Field3::new(face_box(0), mom_ng),
            y_mom: Field3::new(face_box(1), mom_ng),
            z_mom: Field3::new(face_box(2), mom_ng),
            theta: Field3::new(valid, cons_ng),
            ke: Field3::new(valid, cons_ng),
            qke: Field3::new(valid, cons_ng),
            scalar: Field3::new(valid, cons_ng),
            omega: Field3::new(face_box(2), mom_ng),
            pi: Field3::new(valid, cons_ng),
            rho0: Field3::new(valid, cons_ng),
            p0: Field3::new(valid, cons_ng),
            pi0: Field3::new(valid, cons_ng),
        }
    }

    /// Recompute `theta, ke, qke, scalar` from the conserved state: the
    /// "`pre_update`: recompute primitives `φ_k = ρφ_k/ρ`" step of the MRI
    /// driver, evaluated over a region grown by `ngrow` cells.
    pub fn cons_to_prim(&mut self, ngrow: i32) {
        let (lo, hi) = (self.valid.lo, self.valid.hi);
        for k in (lo.2 - ngrow)..=(hi.2 + ngrow) {
            for j in (lo.1 - ngrow)..=(hi.1 + ngrow) {
                for i in (lo.0 - ngrow)..=(hi.0 + ngrow) {
                    let rho = self.rho.get(i, j, k);
                    self.theta.set(i, j, k, self.rho_theta.get(i, j, k) / rho);
                    self.ke.set(i, j, k, self.rho_ke.get(i, j, k) / rho);
                    self.qke.set(i, j, k, self.rho_qke.get(i, j, k) / rho);
                    self.scalar.set(i, j, k, self.rho_scalar.get(i, j, k) / rho);
                }
            }
        }
    }

    /// Exner function `pi = (rho*theta*R_d/p00)^(R_d/c_v)` evaluated from
    /// the ideal-gas equation of state, matching `EOS.H`'s `getExnergivenRTh`.
    pub fn update_exner(&mut self, rd_o_cp: f64, p00: f64) {
        let r_d = crate::config::R_D;
        let (lo, hi) = (self.valid.lo, self.valid.hi);
        let rd_o_cv = rd_o_cp / (1.0 - rd_o_cp);
        for k in lo.2..=hi.2 {
            for j in lo.1..=hi.1 {
                for i in lo.0..=hi.0 {
                    let rt = self.rho_theta.get(i, j, k) * r_d;
                    self.pi.set(i, j, k, (rt / p00).powf(rd_o_cv));
                }
            }
        }
    }
}

/// Average time-integrated momenta accumulated during acoustic substepping
/// (`avg_{x,y,z}mom`); a single box's worth, same face layout as the
/// momentum fields in [`BoxState`].
pub struct AvgMomenta {
    pub x: Field3,
    pub y: Field3,
    pub z: Field3,
}

impl AvgMomenta {
    pub fn zeroed_like(state: &BoxState) -> Self {
        let mut x = state.x_mom.clone();
        let mut y = state.y_mom.clone();
        let mut z = state.z_mom.clone();
        x.fill(0.0);
        y.fill(0.0);
        z.fill(0.0);
        Self { x, y, z }
    }

    pub fn reset_to(&mut self, x_mom: &Field3, y_mom: &Field3, z_mom: &Field3) {
        self.x.clone_from(x_mom);
        self.y.clone_from(y_mom);
        self.z.clone_from(z_mom);
    }
}

impl Clone for Field3 {
    fn clone(&self) -> Self {
        Self {
            lo: self.lo,
            hi: self.hi,
            ng: self.ng,
            data: self.data.clone(),
            stride_y: self.stride_y,
            stride_z: self.stride_z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GhostWidths;

    fn small_box() -> Box3 {
        Box3::new((0, 0, 0), (3, 3, 3))
    }

    #[test]
    fn field_roundtrips_get_set() {
        let mut f = Field3::new(small_box(), GhostWidths::uniform(2));
        f.set(-2, -2, -2, 42.0);
        f.set(5, 5, 5, 7.0);
        assert_eq!(f.get(-2, -2, -2), 42.0);
        assert_eq!(f.get(5, 5, 5), 7.0);
    }

    #[test]
    fn cons_to_prim_divides_by_density() {
        let mut state = BoxState::new(small_box(), GhostWidths::uniform(2), GhostWidths::uniform(1));
        for k in -2..=5 {
            for j in -2..=5 {
                for i in -2..=5 {
                    state.rho.set(i, j, k, 2.0);
                    state.rho_theta.set(i, j, k, 600.0);
                }
            }
        }
        state.cons_to_prim(2);
        assert_eq!(state.theta.get(0, 0, 0), 300.0);
    }

    #[test]
    fn avg_momenta_reset_copies_fields() {
        let state = BoxState::new(small_box(), GhostWidths::uniform(2), GhostWidths::uniform(1));
        let mut avg = AvgMomenta::zeroed_like(&state);
        let mut xm = state.x_mom.clone();
        xm.fill(3.0);
        avg.reset_to(&xm, &state.y_mom, &state.z_mom);
        assert_eq!(avg.x.get(0, 0, 0), 3.0);
    }
}
