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

//! Linear (non-WENO) face reconstruction: centered schemes for the even
//! orders `{2, 4, 6}` and upwind-biased schemes for the odd orders `{3, 5}`,
//! selected by `horiz_spatial_order` / `vert_spatial_order`.
//!
//! Centered stencils are symmetric about the face; upwind-biased stencils
//! shift one point into the upwind direction, matching the way
//! `AdvectionSrcForMom_N.H` picks a sign-dependent stencil for the odd
//! orders while falling back to the order-2 trapezoid average whenever the
//! stencil would reach past the domain edge.

use crate::error::{CoreError, CoreResult};

/// Centered face value at `i-1/2` from a stencil `[phi(i-3)..phi(i+2)]`
/// (6 entries; only the entries the chosen order needs are read).
pub fn reconstruct_centered(order: i32, stencil: &[f64; 6]) -> CoreResult<f64> {
    let [im3, im2, im1, i0, ip1, ip2] = *stencil;
    match order {
        2 => Ok(0.5 * (im1 + i0)),
        4 => Ok((-1.0 / 16.0) * im2 + (9.0 / 16.0) * im1 + (9.0 / 16.0) * i0 + (-1.0 / 16.0) * ip1),
        6 => Ok((3.0 / 256.0) * im3 - (25.0 / 256.0) * im2 + (150.0 / 256.0) * im1
            + (150.0 / 256.0) * i0
            - (25.0 / 256.0) * ip1
            + (3.0 / 256.0) * ip2),
        _ => Err(CoreError::UnsupportedOrder { kind: "centered".into(), order }),
    }
}

/// Upwind-biased face value at `i-1/2`, for a positive (left-to-right)
/// advecting velocity; reverse the stencil and negate the offset for a
/// negative velocity (handled by the caller via [`reconstruct_upwind`]'s
/// `reversed` flag).
pub fn reconstruct_upwind(order: i32, stencil: &[f64; 6], reversed: bool) -> CoreResult<f64> {
    let s = if reversed {
        let [a, b, c, d, e, f] = *stencil;
        [f, e, d, c, b, a]
    } else {
        *stencil
    };
    let [im3, im2, im1, i0, ip1, _ip2] = s;
    match order {
        3 => Ok((-1.0 / 6.0) * im2 + (5.0 / 6.0) * im1 + (2.0 / 6.0) * i0),
        5 => Ok((2.0 / 60.0) * im3 - (13.0 / 60.0) * im2 + (47.0 / 60.0) * im1 + (27.0 / 60.0) * i0
            - (3.0 / 60.0) * ip1),
        _ => Err(CoreError::UnsupportedOrder { kind: "upwind".into(), order }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_order2_is_simple_average() {
        let s = [0.0, 0.0, 1.0, 3.0, 0.0, 0.0];
        assert_eq!(reconstruct_centered(2, &s).unwrap(), 2.0);
    }

    #[test]
    fn centered_schemes_reproduce_linear_field() {
        let s = [-2.0, -1.0, 0.0, 1.0, 2.0, 3.0];
        for order in [2, 4, 6] {
            let v = reconstruct_centered(order, &s).unwrap();
            assert!((v - 0.5).abs() < 1e-10, "order {} gave {}", order, v);
        }
    }

    #[test]
    fn upwind_schemes_reproduce_linear_field() {
        let s = [-2.0, -1.0, 0.0, 1.0, 2.0, 3.0];
        for order in [3, 5] {
            let v = reconstruct_upwind(order, &s, false).unwrap();
            assert!((v - 0.5).abs() < 1e-10, "order {} gave {}", order, v);
        }
    }

    #[test]
    fn upwind_reversed_mirrors_stencil() {
        let s = [-2.0, -1.0, 0.0, 1.0, 2.0, 3.0];
        let fwd = reconstruct_upwind(3, &s, false).unwrap();
        let rev = reconstruct_upwind(3, &s, true).unwrap();
        assert!((fwd - rev).abs() < 1e-9, "linear field should agree either direction");
    }

    #[test]
    fn centered_rejects_unsupported_order() {
        let s = [0.0; 6];
        assert!(matches!(
            reconstruct_centered(5, &s),
            Err(CoreError::UnsupportedOrder { order: 5, .. })
        ));
    }

    #[test]
    fn upwind_rejects_unsupported_order() {
        let s = [0.0; 6];
        assert!(matches!(
            reconstruct_upwind(4, &s, false),
            Err(CoreError::UnsupportedOrder { order: 4, .. })
        ));
    }
}
