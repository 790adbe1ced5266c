//! Bounded Nelder-Mead minimization over the unit hypercube.
//!
//! Every candidate point is projected onto `[0, 1]^d` before evaluation.
//! The search stops when the simplex function values agree within tolerance
//! or the simplex collapses; running out of iterations first is reported as
//! [`TemporaError::NonConvergence`].

use crate::error::{Result, TemporaError};
use serde::{Deserialize, Serialize};

/// Search budget and tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub max_iterations: usize,
    /// Absolute spread of simplex values that counts as converged.
    pub f_tolerance: f64,
    /// Relative spread of simplex values that counts as converged.
    pub f_relative_tolerance: f64,
    /// Simplex diameter below which the search is considered converged.
    pub x_tolerance: f64,
    /// Edge length of the initial simplex.
    pub initial_step: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            f_tolerance: 1e-10,
            f_relative_tolerance: 1e-8,
            x_tolerance: 1e-8,
            initial_step: 0.2,
        }
    }
}

/// Minimizer found by [`minimize_bounded`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub params: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

fn clamp_unit(x: &mut [f64]) {
    for v in x.iter_mut() {
        *v = v.clamp(0.0, 1.0);
    }
}

/// Minimize `f` starting from `start`, keeping every coordinate in `[0, 1]`.
pub fn minimize_bounded<F>(f: F, start: &[f64], options: &SearchOptions) -> Result<SearchResult>
where
    F: Fn(&[f64]) -> f64,
{
    let dim = start.len();
    if dim == 0 {
        return Err(TemporaError::InvalidInput(
            "parameter vector is empty".to_string(),
        ));
    }

    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    // Initial simplex: start plus one step along each axis, flipped inward at
    // the upper bound.
    let mut origin = start.to_vec();
    clamp_unit(&mut origin);
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    simplex.push((origin.clone(), eval(&origin)));
    for i in 0..dim {
        let mut p = origin.clone();
        p[i] = if p[i] + options.initial_step <= 1.0 {
            p[i] + options.initial_step
        } else {
            p[i] - options.initial_step
        };
        clamp_unit(&mut p);
        let v = eval(&p);
        simplex.push((p, v));
    }

    for iteration in 0..options.max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[dim].1;
        let spread = worst - best;
        if spread <= options.f_tolerance + options.f_relative_tolerance * best.abs()
            || diameter(&simplex) <= options.x_tolerance
        {
            let (params, value) = simplex.swap_remove(0);
            return Ok(SearchResult {
                params,
                value,
                iterations: iteration,
            });
        }

        let centroid: Vec<f64> = (0..dim)
            .map(|j| simplex[..dim].iter().map(|(p, _)| p[j]).sum::<f64>() / dim as f64)
            .collect();
        let toward = |coef: f64| -> Vec<f64> {
            let mut p: Vec<f64> = centroid
                .iter()
                .zip(simplex[dim].0.iter())
                .map(|(c, w)| c + coef * (c - w))
                .collect();
            clamp_unit(&mut p);
            p
        };

        let reflected = toward(1.0);
        let f_reflected = eval(&reflected);

        if f_reflected < simplex[0].1 {
            let expanded = toward(2.0);
            let f_expanded = eval(&expanded);
            simplex[dim] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }

        if f_reflected < simplex[dim - 1].1 {
            simplex[dim] = (reflected, f_reflected);
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < simplex[dim].1 {
            let p = toward(0.5);
            let v = eval(&p);
            (p, v)
        } else {
            let p = toward(-0.5);
            let v = eval(&p);
            (p, v)
        };
        if f_contracted < simplex[dim].1.min(f_reflected) {
            simplex[dim] = (contracted, f_contracted);
            continue;
        }

        // Shrink toward the best vertex
        let best_point = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            for (x, b) in vertex.0.iter_mut().zip(best_point.iter()) {
                *x = b + 0.5 * (*x - b);
            }
            vertex.1 = eval(&vertex.0);
        }
    }

    Err(TemporaError::NonConvergence {
        iterations: options.max_iterations,
    })
}

fn diameter(simplex: &[(Vec<f64>, f64)]) -> f64 {
    let base = &simplex[0].0;
    simplex[1..]
        .iter()
        .map(|(p, _)| {
            p.iter()
                .zip(base.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max)
        })
        .fold(0.0, f64::max)
}
