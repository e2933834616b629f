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

//! Typed run configuration ("solver choice"). `SolverChoiceInput` is the
//! `serde`-deserializable surface (any unrecognized key is a hard error);
//! [`SolverChoice::from_input`] validates it once and produces the
//! immutable record that is threaded by reference through every RHS call.

use serde::Deserialize;

use crate::error::{CoreError, CoreResult};

pub const GRAVITY: f64 = 9.81;
pub const R_D: f64 = 287.0;
pub const KAPPA: f64 = 0.41;
pub const GAMMA: f64 = 1.4;
pub const PI_OVER_TWO: f64 = std::f64::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TerrainType {
    Static,
    Moving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum LesType {
    None,
    Smagorinsky,
    Deardorff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PblType {
    None,
    Mynn25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MolecDiffType {
    None,
    Constant,
    ConstantAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AblDriverType {
    None,
    PressureGradient,
    GeostrophicWind,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RayleighDampFlags {
    #[serde(default)]
    pub u: bool,
    #[serde(default)]
    pub v: bool,
    #[serde(default = "default_true")]
    pub w: bool,
    #[serde(default)]
    pub theta: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RayleighDampFlags {
    fn default() -> Self {
        Self { u: false, v: false, w: true, theta: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MostConfig {
    #[serde(default = "default_z0")]
    pub z0: f64,
    pub surf_temp: Option<f64>,
    pub surf_temp_flux: Option<f64>,
}

fn default_z0() -> f64 {
    0.1
}

impl Default for MostConfig {
    fn default() -> Self {
        Self { z0: default_z0(), surf_temp: None, surf_temp_flux: None }
    }
}

/// Raw, user-facing configuration surface. Deserializing this (with
/// `deny_unknown_fields`) is how the "any unlisted key is a hard error"
/// contract is enforced mechanically rather than by hand-rolled checks.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SolverChoiceInput {
    pub use_terrain: bool,
    pub terrain_type: TerrainType,
    pub buoyancy_type: i32,
    pub les_type: LesType,
    pub pbl_type: PblType,
    pub molec_diff_type: MolecDiffType,
    pub horiz_spatial_order: i32,
    pub vert_spatial_order: i32,
    pub all_use_weno: bool,
    pub moist_use_weno: bool,
    pub spatial_order_weno: i32,
    pub use_num_diff: bool,
    pub num_diff_coeff: f64,
    pub use_coriolis: bool,
    pub rotational_time_period: f64,
    pub latitude: f64,
    pub abl_driver_type: AblDriverType,
    pub abl_pressure_grad: [f64; 3],
    pub abl_geo_wind: [f64; 3],
    pub use_rayleigh_damping: bool,
    pub rayleigh_damp: RayleighDampFlags,
    pub most: MostConfig,
    pub c_p: f64,
    pub use_gravity: bool,
    pub alpha_t: f64,
    pub alpha_c: f64,
    pub use_lagged_delta_rt: bool,
    pub force_stage1_single_substep: bool,
    pub fixed_dt: Option<f64>,
}

impl Default for SolverChoiceInput {
    fn default() -> Self {
        Self {
            use_terrain: false,
            terrain_type: TerrainType::Static,
            buoyancy_type: 1,
            les_type: LesType::None,
            pbl_type: PblType::None,
            molec_diff_type: MolecDiffType::None,
            horiz_spatial_order: 2,
            vert_spatial_order: 2,
            all_use_weno: false,
            moist_use_weno: false,
            spatial_order_weno: 3,
            use_num_diff: false,
            num_diff_coeff: 0.0,
            use_coriolis: false,
            rotational_time_period: 86400.0,
            latitude: 90.0,
            abl_driver_type: AblDriverType::None,
            abl_pressure_grad: [0.0, 0.0, 0.0],
            abl_geo_wind: [0.0, 0.0, 0.0],
            use_rayleigh_damping: false,
            rayleigh_damp: RayleighDampFlags::default(),
            most: MostConfig::default(),
            c_p: 1004.5,
            use_gravity: true,
            alpha_t: 0.0,
            alpha_c: 0.0,
            use_lagged_delta_rt: true,
            force_stage1_single_substep: false,
            fixed_dt: None,
        }
    }
}

/// Validated, immutable configuration record. Construct with
/// [`SolverChoice::from_input`]; there is deliberately no public way to
/// mutate one after construction (see "Global mutable state" design note).
#[derive(Debug, Clone, PartialEq)]
pub struct SolverChoice {
    pub use_terrain: bool,
    pub terrain_type: TerrainType,
    pub buoyancy_type: i32,
    pub les_type: LesType,
    pub pbl_type: PblType,
    pub molec_diff_type: MolecDiffType,
    pub horiz_spatial_order: i32,
    pub vert_spatial_order: i32,
    pub all_use_weno: bool,
    pub moist_use_weno: bool,
    pub spatial_order_weno: i32,
    pub use_num_diff: bool,
    /// Already scaled by `2^-6`, matching `NumDiffCoeff *= pow(2, -6)`.
    pub num_diff_coeff: f64,
    pub use_coriolis: bool,
    pub abl_driver_type: AblDriverType,
    pub abl_pressure_grad: [f64; 3],
    pub abl_geo_forcing: [f64; 3],
    pub use_rayleigh_damping: bool,
    pub rayleigh_damp: RayleighDampFlags,
    pub most: MostConfig,
    pub c_p: f64,
    pub gravity: f64,
    pub rd_o_cp: f64,
    pub alpha_t: f64,
    pub alpha_c: f64,
    pub use_lagged_delta_rt: bool,
    pub force_stage1_single_substep: bool,
    pub fixed_dt: Option<f64>,
    /// `2 * (2*pi / rotational_time_period)`; zero when Coriolis is off.
    pub coriolis_factor: f64,
    pub sinphi: f64,
    pub cosphi: f64,
}

impl SolverChoice {
    /// Validate a raw input record and compute its derived constants.
    /// Mirrors `SolverChoice::init_params` from the donor, but returns a
    /// `CoreError::ConfigInvalid` instead of aborting the process.
    pub fn from_input(input: SolverChoiceInput) -> CoreResult<Self> {
        if ![1, 2, 3].contains(&input.buoyancy_type) {
            return Err(CoreError::ConfigInvalid("buoyancy_type must be 1, 2 or 3".into()));
        }
        for (name, order) in [
            ("horiz_spatial_order", input.horiz_spatial_order),
            ("vert_spatial_order", input.vert_spatial_order),
        ] {
            if ![2, 3, 4, 5, 6].contains(&order) {
                return Err(CoreError::ConfigInvalid(format!(
                    "{} must be one of {{2,3,4,5,6}}, got {}",
                    name, order
                )));
            }
        }
        if (input.all_use_weno || input.moist_use_weno)
            && !([3, 5].contains(&input.spatial_order_weno))
        {
            return Err(CoreError::ConfigInvalid(
                "WENO advection only supports orders 3 & 5".into(),
            ));
        }
        if input.use_num_diff && !(0.0..=1.0).contains(&input.num_diff_coeff) {
            return Err(CoreError::ConfigInvalid(
                "numerical diffusion coefficient must be between 0 and 1".into(),
            ));
        }
        if input.molec_diff_type == MolecDiffType::ConstantAlpha && input.les_type != LesType::None
        {
            return Err(CoreError::ConfigInvalid(
                "LES with MolecDiffType::ConstantAlpha is not allowed".into(),
            ));
        }
        if !input.use_lagged_delta_rt && input.terrain_type != TerrainType::Moving {
            return Err(CoreError::ConfigInvalid(
                "cannot disable use_lagged_delta_rt when terrain is not moving".into(),
            ));
        }
        if let (Some(_), Some(_)) = (input.most.surf_temp, input.most.surf_temp_flux) {
            return Err(CoreError::ConfigInvalid(
                "specify only one of most.surf_temp or most.surf_temp_flux".into(),
            ));
        }

        let gravity = if input.use_gravity { GRAVITY } else { 0.0 };
        let rd_o_cp = R_D / input.c_p;

        let num_diff_coeff = if input.use_num_diff {
            input.num_diff_coeff * 2f64.powi(-6)
        } else {
            0.0
        };

        let (coriolis_factor, sinphi, cosphi) = if input.use_coriolis {
            let f = 2.0 * 2.0 * std::f64::consts::PI / input.rotational_time_period;
            let lat = input.latitude * std::f64::consts::PI / 180.0;
            (f, lat.sin(), lat.cos())
        } else {
            (0.0, 0.0, 1.0)
        };

        let abl_geo_forcing = if input.abl_driver_type == AblDriverType::GeostrophicWind {
            let [u_g, v_g, w_g] = input.abl_geo_wind;
            [
                -coriolis_factor * (v_g * sinphi - w_g * cosphi),
                coriolis_factor * u_g * sinphi,
                -coriolis_factor * u_g * cosphi,
            ]
        } else {
            [0.0, 0.0, 0.0]
        };

        Ok(SolverChoice {
            use_terrain: input.use_terrain,
            terrain_type: input.terrain_type,
            buoyancy_type: input.buoyancy_type,
            les_type: input.les_type,
            pbl_type: input.pbl_type,
            molec_diff_type: input.molec_diff_type,
            horiz_spatial_order: input.horiz_spatial_order,
            vert_spatial_order: input.vert_spatial_order,
            all_use_weno: input.all_use_weno,
            moist_use_weno: input.moist_use_weno,
            spatial_order_weno: input.spatial_order_weno,
            use_num_diff: input.use_num_diff,
            num_diff_coeff,
            use_coriolis: input.use_coriolis,
            abl_driver_type: input.abl_driver_type,
            abl_pressure_grad: input.abl_pressure_grad,
            abl_geo_forcing,
            use_rayleigh_damping: input.use_rayleigh_damping,
            rayleigh_damp: input.rayleigh_damp,
            most: input.most,
            c_p: input.c_p,
            gravity,
            rd_o_cp,
            alpha_t: input.alpha_t,
            alpha_c: input.alpha_c,
            use_lagged_delta_rt: input.use_lagged_delta_rt,
            force_stage1_single_substep: input.force_stage1_single_substep,
            fixed_dt: input.fixed_dt,
            coriolis_factor,
            sinphi,
            cosphi,
        })
    }

    /// Convenience for tests and simple callers: validate the defaults.
    pub fn default_validated() -> Self {
        Self::from_input(SolverChoiceInput::default()).expect("defaults are always valid")
    }

    pub fn c_v(&self) -> f64 {
        self.c_p - R_D
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let sc = SolverChoice::default_validated();
        assert_eq!(sc.buoyancy_type, 1);
        assert!(!sc.use_terrain);
        assert_eq!(sc.gravity, GRAVITY);
    }

    #[test]
    fn rejects_bad_buoyancy_type() {
        let mut input = SolverChoiceInput::default();
        input.buoyancy_type = 7;
        assert!(matches!(
            SolverChoice::from_input(input),
            Err(CoreError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn rejects_weno_order_outside_3_5() {
        let mut input = SolverChoiceInput::default();
        input.all_use_weno = true;
        input.spatial_order_weno = 4;
        assert!(SolverChoice::from_input(input).is_err());
    }

    #[test]
    fn rejects_constant_alpha_with_les() {
        let mut input = SolverChoiceInput::default();
        input.molec_diff_type = MolecDiffType::ConstantAlpha;
        input.les_type = LesType::Smagorinsky;
        assert!(SolverChoice::from_input(input).is_err());
    }

    #[test]
    fn rejects_unlagged_static_terrain() {
        let mut input = SolverChoiceInput::default();
        input.use_lagged_delta_rt = false;
        input.terrain_type = TerrainType::Static;
        assert!(SolverChoice::from_input(input).is_err());
    }

    #[test]
    fn rejects_conflicting_most_surface_spec() {
        let mut input = SolverChoiceInput::default();
        input.most.surf_temp = Some(300.0);
        input.most.surf_temp_flux = Some(0.1);
        assert!(SolverChoice::from_input(input).is_err());
    }

    #[test]
    fn coriolis_factor_matches_rotation_period() {
        let mut input = SolverChoiceInput::default();
        input.use_coriolis = true;
        input.rotational_time_period = 86400.0;
        let sc = SolverChoice::from_input(input).unwrap();
        assert!((sc.coriolis_factor - 4.0 * std::f64::consts::PI / 86400.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_key_is_rejected_by_deserializer() {
        let json = r#"{"use_terrain": true, "bogus_key": 1}"#;
        let result: Result<SolverChoiceInput, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
