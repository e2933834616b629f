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

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use erf_mri_core::config::{SolverChoice, SolverChoiceInput};
use erf_mri_core::convert::LocalGhostExchange;
use erf_mri_core::grid::{Box3, Geometry, GhostWidths, Periodicity};
use erf_mri_core::mri::MriDriver;
use erf_mri_core::state::BoxState;

fn quiescent_column(nx: i32, ny: i32, nz: i32, cons_ng: GhostWidths, mom_ng: GhostWidths) -> BoxState {
    let valid = Box3::new((0, 0, 0), (nx - 1, ny - 1, nz - 1));
    let mut state = BoxState::new(valid, cons_ng, mom_ng);
    let lo = (valid.lo.0 - cons_ng.nx, valid.lo.1 - cons_ng.ny, valid.lo.2 - cons_ng.nz);
    let hi = (valid.hi.0 + cons_ng.nx, valid.hi.1 + cons_ng.ny, valid.hi.2 + cons_ng.nz);
    for k in lo.2..=hi.2 {
        for j in lo.1..=hi.1 {
            for i in lo.0..=hi.0 {
                state.rho.set(i, j, k, 1.1);
                state.rho_theta.set(i, j, k, 1.1 * 300.0);
                state.theta.set(i, j, k, 300.0);
                state.rho0.set(i, j, k, 1.1);
                state.p0.set(i, j, k, 1.1 * erf_mri_core::config::R_D * 300.0);
                state.pi.set(i, j, k, 1.0);
            }
        }
    }
    state
}

/// Benchmarks one full `MriDriver::advance` timestep (3 RK3 stages, each
/// with its own acoustic substep loop) over a single column-shaped box of
/// increasing horizontal extent, matching the donor's focus on per-column
/// vertical solve cost as the dominant term in the fast loop.
fn bench_mri_advance(c: &mut Criterion) {
    let sc = SolverChoice::from_input(SolverChoiceInput::default()).unwrap();
    let exch = LocalGhostExchange { periodic_x: true, periodic_y: true };
    let mut group = c.benchmark_group("mri_advance");

    for &n in &[4, 8, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let cons_ng = GhostWidths::for_solver_choice(&sc);
            let mom_ng = GhostWidths::uniform(cons_ng.nx.max(1));
            b.iter_batched(
                || {
                    let state = quiescent_column(n, n, 16, cons_ng, mom_ng);
                    let geom = Geometry::flat(state.valid, 100.0, 100.0, 50.0, Periodicity { x: true, y: true });
                    (state, geom)
                },
                |(mut state, geom)| {
                    let driver = MriDriver::new(&sc, &exch);
                    driver.advance(&mut state, &geom, black_box(0.1), black_box(6)).unwrap();
                    black_box(state.rho.get(0, 0, 1));
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_mri_advance);
criterion_main!(benches);
