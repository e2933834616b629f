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

//! WENO-3 / WENO-5 face reconstruction, direction-agnostic: callers hand in
//! the five stencil values `[phi(i-3), phi(i-2), phi(i-1), phi(i), phi(i+1)]`
//! already gathered along whichever axis is being reconstructed. Order 3
//! only reads the last three.

const EPS: f64 = 1.0e-6;

/// Reconstructs the left-biased face value at `i-1/2` from a 5-wide
/// one-sided stencil, per `Interpolation_WENO.H`'s `InterpolateInX/Y/Z_WENO`.
/// `order` must be 3 or 5.
pub fn reconstruct(order: i32, stencil: &[f64; 5]) -> f64 {
    let [im3, im2, im1, i0, ip1] = *stencil;
    match order {
        3 => {
            let beta1 = (im1 - im2) * (im1 - im2);
            let beta2 = (i0 - im1) * (i0 - im1);

            let mut w1 = (1.0 / 3.0) / ((EPS + beta1) * (EPS + beta1));
            let mut w2 = (2.0 / 3.0) / ((EPS + beta2) * (EPS + beta2));

            let phi1 = 0.5 * (-im2 + 3.0 * im1);
            let phi2 = 0.5 * (im1 + i0);

            let sum = w1 + w2;
            w1 /= sum;
            w2 /= sum;
            w1 * phi1 + w2 * phi2
        }
        5 => {
            let mut beta1 = (13.0 / 12.0) * (im3 - 2.0 * im2 + im1).powi(2);
            beta1 += 0.25 * (im3 - 4.0 * im2 + 3.0 * im1).powi(2);

            let mut beta2 = (13.0 / 12.0) * (im2 - 2.0 * im1 + i0).powi(2);
            beta2 += 0.25 * (im2 - i0).powi(2);

            let mut beta3 = (13.0 / 12.0) * (im1 - 2.0 * i0 + ip1).powi(2);
            beta3 += 0.25 * (3.0 * im1 - 4.0 * i0 + ip1).powi(2);

            let mut w1 = (1.0 / 10.0) / ((EPS + beta1) * (EPS + beta1));
            let mut w2 = (3.0 / 5.0) / ((EPS + beta2) * (EPS + beta2));
            let mut w3 = (3.0 / 10.0) / ((EPS + beta3) * (EPS + beta3));

            let phi1 = (1.0 / 3.0) * im3 - (7.0 / 6.0) * im2 + (11.0 / 6.0) * im1;
            let phi2 = -(1.0 / 6.0) * im2 + (5.0 / 6.0) * im1 + (1.0 / 3.0) * i0;
            let phi3 = (1.0 / 3.0) * im1 + (5.0 / 6.0) * i0 - (1.0 / 6.0) * ip1;

            let sum = w1 + w2 + w3;
            w1 /= sum;
            w2 /= sum;
            w3 /= sum;
            w1 * phi1 + w2 * phi2 + w3 * phi3
        }
        _ => panic!("WENO order must be 3 or 5, got {}", order),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weno5_reproduces_linear_field_exactly() {
        // A linear field has zero smoothness indicators past roundoff, so
        // all three sub-stencils agree and the reconstruction matches the
        // exact face value i-1/2 = 2.5 for phi(i) = i.
        let stencil = [0.0, 1.0, 2.0, 3.0, 4.0];
        let result = reconstruct(5, &stencil);
        assert!((result - 2.5).abs() < 1e-10);
    }

    #[test]
    fn weno3_reproduces_linear_field_exactly() {
        let stencil = [0.0, 0.0, 1.0, 2.0, 0.0];
        let result = reconstruct(3, &stencil);
        assert!((result - 1.5).abs() < 1e-10);
    }

    #[test]
    fn weno5_favors_smooth_side_near_discontinuity() {
        // Sharp jump between i-1 and i: the left-biased phi1/phi2 stencils
        // (not touching the jump) should dominate the nonlinear weights.
        let stencil = [1.0, 1.0, 1.0, 100.0, 100.0];
        let result = reconstruct(5, &stencil);
        assert!(result < 50.0, "expected WENO to suppress the jump, got {}", result);
    }
}
