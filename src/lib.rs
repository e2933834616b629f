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

//! Multi-rate time integration core for a compressible, non-hydrostatic
//! atmosphere on block-structured, terrain-following Cartesian meshes.
//!
//! This crate owns the per-box numerics: the conserved-variable store, the
//! spatial reconstruction (WENO / centered / upwind), advection and
//! diffusion RHS assembly, the Monin-Obukhov surface layer, the tridiagonal
//! acoustic solve, and the [`mri::MriDriver`] state machine that ties them
//! together into one RK3-with-acoustic-substepping timestep. The mesh/AMR
//! manager, I/O, and CFL-number computation are collaborators reached
//! through the [`convert::GhostExchange`] seam and are out of scope here.
//!
//! Usage
//! -----
//! ```
//! use erf_mri_core::config::{SolverChoice, SolverChoiceInput};
//! use erf_mri_core::convert::LocalGhostExchange;
//! use erf_mri_core::grid::{Box3, GhostWidths, Geometry, Periodicity};
//! use erf_mri_core::mri::MriDriver;
//! use erf_mri_core::state::BoxState;
//!
//! let sc = SolverChoice::from_input(SolverChoiceInput::default()).unwrap();
//! let valid = Box3::new((0, 0, 0), (3, 3, 7));
//! let cons_ng = GhostWidths::for_solver_choice(&sc);
//! let mom_ng = GhostWidths::uniform(cons_ng.nx.max(1));
//! let mut state = BoxState::new(valid, cons_ng, mom_ng);
//! let geom = Geometry::flat(valid, 100.0, 100.0, 50.0, Periodicity { x: true, y: true });
//! let exch = LocalGhostExchange { periodic_x: true, periodic_y: true };
//! let driver = MriDriver::new(&sc, &exch);
//! driver.advance(&mut state, &geom, 0.1, 4).unwrap();
//! ```

pub mod advection;
pub mod boundary;
pub mod config;
pub mod convert;
pub mod diffusion;
pub mod error;
pub mod fast_coeffs;
pub mod fast_rhs;
pub mod grid;
pub mod interp;
pub mod mri;
pub mod slow_rhs;
pub mod state;
pub mod terrain;
