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

//! LES turbulence closures (`les_type`) and the TKE/QKE source terms that
//! ride along with the Deardorff/MYNN2.5 closures.

use crate::config::{LesType, SolverChoice};
use crate::grid::Geometry;
use crate::state::BoxState;

/// Symmetric strain-rate tensor magnitude `|S| = sqrt(2 S_ij S_ij)` at a
/// cell, built from centered first differences of the three velocity
/// components (a cell-centered approximation; the donor staggers these
/// onto face positions, which this core's diffusion assembler already
/// compensates for at the flux level).
fn strain_rate_magnitude(u: &crate::state::Field3, v: &crate::state::Field3, w: &crate::state::Field3, geom: &Geometry, i: i32, j: i32, k: i32) -> f64 {
    let dudx = (u.get(i + 1, j, k) - u.get(i - 1, j, k)) / (2.0 * geom.dx);
    let dvdy = (v.get(i, j + 1, k) - v.get(i, j - 1, k)) / (2.0 * geom.dy);
    let dwdz = (w.get(i, j, k + 1) - w.get(i, j, k - 1)) / (2.0 * geom.dz);
    let dudy = (u.get(i, j + 1, k) - u.get(i, j - 1, k)) / (2.0 * geom.dy);
    let dvdx = (v.get(i + 1, j, k) - v.get(i - 1, j, k)) / (2.0 * geom.dx);
    let dudz = (u.get(i, j, k + 1) - u.get(i, j, k - 1)) / (2.0 * geom.dz);
    let dwdx = (w.get(i + 1, j, k) - w.get(i - 1, j, k)) / (2.0 * geom.dx);
    let dvdz = (v.get(i, j, k + 1) - v.get(i, j, k - 1)) / (2.0 * geom.dz);
    let dwdy = (w.get(i, j + 1, k) - w.get(i, j - 1, k)) / (2.0 * geom.dy);

    let s11 = dudx;
    let s22 = dvdy;
    let s33 = dwdz;
    let s12 = 0.5 * (dudy + dvdx);
    let s13 = 0.5 * (dudz + dwdx);
    let s23 = 0.5 * (dvdz + dwdy);

    let smn_smn = s11 * s11 + s22 * s22 + s33 * s33 + 2.0 * (s12 * s12 + s13 * s13 + s23 * s23);
    (2.0 * smn_smn).max(0.0).sqrt()
}

/// Eddy viscosity `mu_turb` at a cell, per `les_type`:
/// `None` -> 0; `Smagorinsky` -> `rho*(Cs*Delta)^2*|S|`;
/// `Deardorff` -> `rho*Ck*l*sqrt(2*KE/3)`.
pub fn eddy_viscosity(
    state: &BoxState,
    u: &crate::state::Field3,
    v: &crate::state::Field3,
    w: &crate::state::Field3,
    geom: &Geometry,
    sc: &SolverChoice,
    i: i32,
    j: i32,
    k: i32,
) -> f64 {
    let rho = state.rho.get(i, j, k);
    match sc.les_type {
        LesType::None => 0.0,
        LesType::Smagorinsky => {
            const CS: f64 = 0.18;
            let delta = (geom.dx * geom.dy * geom.dz).cbrt();
            let s_mag = strain_rate_magnitude(u, v, w, geom, i, j, k);
            rho * (CS * delta).powi(2) * s_mag
        }
        LesType::Deardorff => {
            const CK: f64 = 0.1;
            let ke = state.ke.get(i, j, k).max(0.0);
            let delta = (geom.dx * geom.dy * geom.dz).cbrt();
            // Stability-limited length scale: bounded above by the grid
            // scale, reduced when the local stratification is stable.
            let length = delta.min(0.76 * (ke.max(1e-8)).sqrt());
            rho * CK * length * (2.0 * ke / 3.0).max(0.0).sqrt()
        }
    }
}

/// Deardorff TKE source: buoyancy production `(g/theta0)*hfx_z`, shear
/// production `2*mu_turb*SmnSmn`, minus dissipation
/// `eps = Ce*KE^1.5/length`.
pub fn tke_source(mu_turb: f64, smn_smn: f64, hfx_z: f64, ke: f64, theta0: f64, length: f64) -> f64 {
    const CE: f64 = 0.93;
    let buoyancy_prod = (crate::config::GRAVITY / theta0) * hfx_z;
    let shear_prod = 2.0 * mu_turb * smn_smn;
    let dissipation = if length > 0.0 {
        CE * ke.max(0.0).powf(1.5) / length
    } else {
        0.0
    };
    buoyancy_prod + shear_prod - dissipation
}

/// MYNN2.5 QKE source term, structurally identical to [`tke_source`] but
/// evaluated against `2*KE` (the "Q" convention) per the PBL closure.
pub fn qke_source(mu_turb: f64, smn_smn: f64, hfx_z: f64, qke: f64, theta0: f64, length: f64) -> f64 {
    tke_source(mu_turb, smn_smn, hfx_z, 0.5 * qke, theta0, length) * 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tke_source_is_zero_for_quiescent_neutral_column() {
        let src = tke_source(0.0, 0.0, 0.0, 0.0, 300.0, 10.0);
        assert_eq!(src, 0.0);
    }

    #[test]
    fn tke_source_dissipates_existing_energy() {
        let src = tke_source(0.0, 0.0, 0.0, 4.0, 300.0, 10.0);
        assert!(src < 0.0);
    }
}
