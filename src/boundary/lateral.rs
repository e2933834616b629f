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

//! Lateral (x/y) boundary-condition kinds and their ghost-fill formulas.
//! The physical Dirichlet/extrapolated *values* themselves come from the
//! out-of-scope sounding/idealized-problem loader; this module only
//! applies the fill given that value (or a flag that the fill is
//! homogeneous), per the component contract's "this core only applies the
//! fill" boundary.

use crate::state::Field3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcKind {
    Periodic,
    ExtDir,
    FoExtrap,
    Neumann,
    Reflect,
}

/// Fills one ghost cell at `(ig, jg, kg)` from its interior mirror
/// `(ii, ji, ki)`, given the BC kind and (for `ExtDir`) the physical
/// Dirichlet value supplied by the caller. `Reflect` additionally flips
/// the sign, used for the normal velocity component at a slip wall.
pub fn fill_ghost(
    field: &mut Field3,
    ig: i32,
    jg: i32,
    kg: i32,
    ii: i32,
    ji: i32,
    ki: i32,
    kind: BcKind,
    dirichlet_value: f64,
) {
    let value = match kind {
        BcKind::Periodic => field.get(ii, ji, ki),
        BcKind::ExtDir => 2.0 * dirichlet_value - field.get(ii, ji, ki),
        BcKind::FoExtrap => field.get(ii, ji, ki),
        BcKind::Neumann => field.get(ii, ji, ki),
        BcKind::Reflect => -field.get(ii, ji, ki),
    };
    field.set(ig, jg, kg, value);
}

/// Fills the `ng`-wide lateral ghost region of one face along the low-x
/// side of a periodic or physical domain, used by the fill-patch glue's
/// velocity ghost fill step. `source_offset` is the periodic wrap length
/// (`nx`) for `Periodic`, ignored otherwise.
pub fn fill_lo_x(field: &mut Field3, lo_x: i32, j_range: std::ops::RangeInclusive<i32>, k_range: std::ops::RangeInclusive<i32>, ng: i32, kind: BcKind, source_offset: i32, dirichlet_value: f64) {
    for k in k_range.clone() {
        for j in j_range.clone() {
            for g in 1..=ng {
                let (ii, ji, ki) = match kind {
                    BcKind::Periodic => (lo_x - g + source_offset, j, k),
                    _ => (lo_x + g - 1, j, k),
                };
                fill_ghost(field, lo_x - g, j, k, ii, ji, ki, kind, dirichlet_value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Box3, GhostWidths};

    #[test]
    fn periodic_ghost_wraps_from_opposite_side() {
        let mut f = Field3::new(Box3::new((0, 0, 0), (3, 0, 0)), GhostWidths::uniform(2));
        for i in 0..=3 {
            f.set(i, 0, 0, i as f64 + 1.0);
        }
        fill_ghost(&mut f, -1, 0, 0, 3, 0, 0, BcKind::Periodic, 0.0);
        assert_eq!(f.get(-1, 0, 0), 4.0);
    }

    #[test]
    fn reflect_ghost_negates_interior_value() {
        let mut f = Field3::new(Box3::new((0, 0, 0), (3, 0, 0)), GhostWidths::uniform(2));
        f.set(0, 0, 0, 5.0);
        fill_ghost(&mut f, -1, 0, 0, 0, 0, 0, BcKind::Reflect, 0.0);
        assert_eq!(f.get(-1, 0, 0), -5.0);
    }

    #[test]
    fn ext_dir_ghost_mirrors_about_dirichlet_value() {
        let mut f = Field3::new(Box3::new((0, 0, 0), (3, 0, 0)), GhostWidths::uniform(2));
        f.set(0, 0, 0, 2.0);
        fill_ghost(&mut f, -1, 0, 0, 0, 0, 0, BcKind::ExtDir, 10.0);
        assert_eq!(f.get(-1, 0, 0), 18.0);
    }
}
