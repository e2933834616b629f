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

//! Grid and metric store: cell sizes, box index ranges, periodicity, and
//! (when terrain is active) the node-height / Jacobian / grid-velocity
//! fields the rest of the core reads through.

use crate::config::SolverChoice;
use crate::error::{CoreError, CoreResult};

/// A single logically-rectangular sub-box with a uniform ghost halo.
///
/// Indices follow AMReX convention: `lo..=hi` is the valid region, and the
/// halo extends `ng` cells beyond it in every direction. All field storage
/// in [`crate::state`] is addressed relative to `lo - ng`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Box3 {
    pub lo: (i32, i32, i32),
    pub hi: (i32, i32, i32),
}

impl Box3 {
    pub fn new(lo: (i32, i32, i32), hi: (i32, i32, i32)) -> Self {
        Self { lo, hi }
    }

    pub fn nx(&self) -> i32 {
        self.hi.0 - self.lo.0 + 1
    }
    pub fn ny(&self) -> i32 {
        self.hi.1 - self.lo.1 + 1
    }
    pub fn nz(&self) -> i32 {
        self.hi.2 - self.lo.2 + 1
    }

    pub fn is_empty(&self) -> bool {
        self.nx() <= 0 || self.ny() <= 0 || self.nz() <= 0
    }
}

/// Per-axis ghost halo width. The halo must be at least
/// `max(horiz/vert spatial order, WENO order)/2 + 1` to satisfy the
/// "highest spatial reconstruction order plus one for eddy viscosity" rule;
/// [`GhostWidths::for_solver_choice`] computes the minimum compliant value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GhostWidths {
    pub nx: i32,
    pub ny: i32,
    pub nz: i32,
}

impl GhostWidths {
    pub fn uniform(n: i32) -> Self {
        Self { nx: n, ny: n, nz: n }
    }

    pub fn for_solver_choice(sc: &SolverChoice) -> Self {
        let weno_order = if sc.all_use_weno || sc.moist_use_weno {
            sc.spatial_order_weno
        } else {
            0
        };
        let max_order = sc.horiz_spatial_order.max(sc.vert_spatial_order).max(weno_order);
        // Highest order stencil needs order/2 cells each side; +1 for eddy
        // viscosity gradients that reach one cell further.
        let n = (max_order + 1) / 2 + 1;
        Self::uniform(n.clamp(1, 3))
    }
}

/// Periodicity flags; the vertical axis is never periodic (data model
/// invariant), so there is deliberately no `periodic_z` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Periodicity {
    pub x: bool,
    pub y: bool,
}

/// Owns cell sizes and (optionally) the terrain metric fields for one box.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub domain: Box3,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub periodicity: Periodicity,
    /// Node-centered terrain height `z_nd(i,j,k)`, `None` when `!use_terrain`.
    /// Flattened with x fastest, matching the donor's row-major `Array4`
    /// layout and this crate's [`crate::state`] storage convention.
    z_nd: Option<Vec<f64>>,
    /// Cell-centered Jacobian `detJ = dz/dzeta`; `None` implies `detJ = 1`.
    det_j: Option<Vec<f64>>,
    /// Vertical grid velocity between RK stages; `None` implies zero.
    z_t: Option<Vec<f64>>,
    nx_node: i32,
    ny_node: i32,
    nz_node: i32,
}

impl Geometry {
    /// Flat geometry (`use_terrain = false`): `detJ == 1`, `z_t == 0`
    /// everywhere, consistent with the glossary's "`detJ` ... = 1 without
    /// terrain" convention.
    pub fn flat(domain: Box3, dx: f64, dy: f64, dz: f64, periodicity: Periodicity) -> Self {
        Self {
            domain,
            dx,
            dy,
            dz,
            periodicity,
            z_nd: None,
            det_j: None,
            z_t: None,
            nx_node: domain.nx() + 1,
            ny_node: domain.ny() + 1,
            nz_node: domain.nz() + 1,
        }
    }

    /// Terrain-following geometry built from a node-height field supplied
    /// by the (out of scope) idealized/sounding loader. `z_nd` must have
    /// `(nx+1)*(ny+1)*(nz+1)` entries in x-fastest order.
    pub fn with_terrain(
        domain: Box3,
        dx: f64,
        dy: f64,
        periodicity: Periodicity,
        z_nd: Vec<f64>,
    ) -> CoreResult<Self> {
        let nx_node = domain.nx() + 1;
        let ny_node = domain.ny() + 1;
        let nz_node = domain.nz() + 1;
        let expected = (nx_node * ny_node * nz_node) as usize;
        if z_nd.len() != expected {
            return Err(CoreError::GeometryInvalid(format!(
                "z_nd has {} entries, expected {}",
                z_nd.len(),
                expected
            )));
        }
        for k in 1..nz_node as usize {
            for j in 0..ny_node as usize {
                for i in 0..nx_node as usize {
                    let idx = (k * ny_node as usize + j) * nx_node as usize + i;
                    let idx_below = ((k - 1) * ny_node as usize + j) * nx_node as usize + i;
                    if z_nd[idx] <= z_nd[idx_below] {
                        return Err(CoreError::GeometryInvalid(
                            "z_nd must be strictly monotone increasing in k".into(),
                        ));
                    }
                }
            }
        }

        let mut geom = Self {
            domain,
            dx,
            dy,
            dz: 1.0, // unused once terrain is active; dzeta is uniform
            periodicity,
            z_nd: Some(z_nd),
            det_j: None,
            z_t: None,
            nx_node,
            ny_node,
            nz_node,
        };
        geom.dz = 1.0 / domain.nz() as f64
            * (geom.node(0, 0, nz_node - 1) - geom.node(0, 0, 0)).max(f64::EPSILON);
        geom.recompute_det_j()?;
        Ok(geom)
    }

    fn node_index(&self, i: i32, j: i32, k: i32) -> usize {
        let i = (i - self.domain.lo.0) as usize;
        let j = (j - self.domain.lo.1) as usize;
        let k = k as usize;
        (k * self.ny_node as usize + j) * self.nx_node as usize + i
    }

    pub fn node(&self, i: i32, j: i32, k: i32) -> f64 {
        match &self.z_nd {
            Some(z) => z[self.node_index(i, j, k)],
            None => k as f64 * self.dz,
        }
    }

    pub fn has_terrain(&self) -> bool {
        self.z_nd.is_some()
    }

    fn cell_index(&self, i: i32, j: i32, k: i32) -> usize {
        let i = (i - self.domain.lo.0) as usize;
        let j = (j - self.domain.lo.1) as usize;
        let k = k as usize;
        (k * self.domain.ny() as usize + j) * self.domain.nx() as usize + i
    }

    /// `detJ(i,j,k) = [z_nd interpolated to cell-center-k+1/2] - [... k-1/2]`
    /// divided by the uniform computational spacing `dzeta = dz`, i.e. the
    /// discrete vertical stretching factor at the cell center.
    fn recompute_det_j(&mut self) -> CoreResult<()> {
        if !self.has_terrain() {
            self.det_j = None;
            return Ok(());
        }
        let (nx, ny, nz) = (self.domain.nx(), self.domain.ny(), self.domain.nz());
        let mut det_j = vec![0.0; (nx * ny * nz) as usize];
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let ii = i + self.domain.lo.0;
                    let jj = j + self.domain.lo.1;
                    let z_lo = 0.25
                        * (self.node(ii, jj, k) + self.node(ii + 1, jj, k)
                            + self.node(ii, jj + 1, k)
                            + self.node(ii + 1, jj + 1, k));
                    let z_hi = 0.25
                        * (self.node(ii, jj, k + 1)
                            + self.node(ii + 1, jj, k + 1)
                            + self.node(ii, jj + 1, k + 1)
                            + self.node(ii + 1, jj + 1, k + 1));
                    let value = (z_hi - z_lo) / self.dz;
                    if value <= 0.0 {
                        return Err(CoreError::GeometryInvalid(format!(
                            "detJ <= 0 at cell ({}, {}, {})",
                            ii, jj, k
                        )));
                    }
                    det_j[self.cell_index(ii, jj, k) as usize] = value;
                }
            }
        }
        self.det_j = Some(det_j);
        Ok(())
    }

    pub fn det_j(&self, i: i32, j: i32, k: i32) -> f64 {
        match &self.det_j {
            Some(d) => d[self.cell_index(i, j, k)],
            None => 1.0,
        }
    }

    pub fn z_t(&self, i: i32, j: i32, k: i32) -> f64 {
        match &self.z_t {
            Some(zt) => zt[self.cell_index(i, j, k)],
            None => 0.0,
        }
    }

    pub fn set_z_t(&mut self, z_t: Vec<f64>) {
        self.z_t = Some(z_t);
    }

    /// Linear-in-stage-time interpolation between the node heights at the
    /// start of the step and the end of the step, per the moving-terrain
    /// geometry rebuild described in the slow-RHS assembler contract.
    pub fn interpolate_moving_terrain(
        z_nd_old: &Geometry,
        z_nd_new: &Geometry,
        frac: f64,
    ) -> CoreResult<Geometry> {
        let z_old = z_nd_old
            .z_nd
            .as_ref()
            .ok_or_else(|| CoreError::GeometryInvalid("missing z_nd_old".into()))?;
        let z_new = z_nd_new
            .z_nd
            .as_ref()
            .ok_or_else(|| CoreError::GeometryInvalid("missing z_nd_new".into()))?;
        let blended: Vec<f64> = z_old
            .iter()
            .zip(z_new.iter())
            .map(|(a, b)| a + frac * (b - a))
            .collect();
        let mut geom = Geometry::with_terrain(
            z_nd_old.domain,
            z_nd_old.dx,
            z_nd_old.dy,
            z_nd_old.periodicity,
            blended,
        )?;
        let dt_frac = 1.0; // caller scales z_t externally by 1/dt
        let nx = geom.domain.nx();
        let ny = geom.domain.ny();
        let nz = geom.domain.nz();
        let lo = geom.domain.lo;
        let z_t: Vec<f64> = (0..nz)
            .flat_map(|k| (0..ny).flat_map(move |j| (0..nx).map(move |i| (i, j, k))))
            .map(|(i, j, k)| {
                let ii = i + lo.0;
                let jj = j + lo.1;
                (z_new[z_nd_new.node_index(ii, jj, k)] - z_old[z_nd_old.node_index(ii, jj, k)])
                    * dt_frac
            })
            .collect();
        geom.set_z_t(z_t);
        Ok(geom)
    }

    /// Map-scale factors. Always 1 unless a map projection collaborator
    /// supplies them (out of scope here); kept as a method so downstream
    /// kernels have a single seam to multiply through.
    pub fn mf_m(&self, _i: i32, _j: i32) -> f64 {
        1.0
    }
    pub fn mf_u(&self, _i: i32, _j: i32) -> f64 {
        1.0
    }
    pub fn mf_v(&self, _i: i32, _j: i32) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_geom() -> Geometry {
        Geometry::flat(Box3::new((0, 0, 0), (3, 3, 7)), 100.0, 100.0, 50.0, Periodicity { x: true, y: true })
    }

    #[test]
    fn flat_geometry_has_unit_jacobian() {
        let g = flat_geom();
        assert_eq!(g.det_j(1, 1, 3), 1.0);
        assert_eq!(g.z_t(1, 1, 3), 0.0);
        assert!(!g.has_terrain());
    }

    #[test]
    fn terrain_geometry_rejects_nonmonotone_heights() {
        let domain = Box3::new((0, 0, 0), (1, 1, 1));
        let nx = 3;
        let ny = 3;
        let nz = 3;
        let mut z = vec![0.0; nx * ny * nz];
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    z[(k * ny + j) * nx + i] = if k == 2 { 0.5 } else { k as f64 };
                }
            }
        }
        let result = Geometry::with_terrain(domain, 100.0, 100.0, Periodicity::default(), z);
        assert!(matches!(result, Err(CoreError::GeometryInvalid(_))));
    }

    #[test]
    fn terrain_geometry_computes_positive_jacobian() {
        let domain = Box3::new((0, 0, 0), (1, 1, 3));
        let nx = 3;
        let ny = 3;
        let nz = 5;
        let mut z = vec![0.0; nx * ny * nz];
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    z[(k * ny + j) * nx + i] = k as f64 * 50.0 + 0.1 * i as f64;
                }
            }
        }
        let geom = Geometry::with_terrain(domain, 100.0, 100.0, Periodicity::default(), z).unwrap();
        for k in 0..domain.nz() {
            assert!(geom.det_j(0, 0, k) > 0.0);
        }
    }

    #[test]
    fn ghost_widths_scale_with_order() {
        let sc = crate::config::SolverChoice::default_validated();
        let gw = GhostWidths::for_solver_choice(&sc);
        assert_eq!(gw.nx, 2); // order 2 -> 1/2+1 -> 1, clamp min 1... actually 2/2+1=2
    }
}
