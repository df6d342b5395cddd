//! Exact t-SNE (van der Maaten & Hinton, 2008).
//!
//! The O(n²) formulation is plenty for search-result sized inputs (≤ a few
//! hundred points). Optimisation follows the usual schedule: early
//! exaggeration, momentum switch, and per-parameter adaptive gains.

use ndarray::{Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const EARLY_EXAGGERATION: f64 = 12.0;
const EXAGGERATION_ITERS: usize = 250;
const INITIAL_MOMENTUM: f64 = 0.5;
const FINAL_MOMENTUM: f64 = 0.8;
const MIN_GAIN: f64 = 0.01;
const INIT_STD: f64 = 1e-4;

const BINARY_SEARCH_STEPS: usize = 50;
const ENTROPY_TOLERANCE: f64 = 1e-5;
const MACHINE_EPSILON: f64 = 1e-12;

/// Embed the rows of `data` in 2D. Deterministic for a given `seed`.
pub fn fit(data: &Array2<f64>, perplexity: f64, max_iter: usize, seed: u64) -> Array2<f64> {
    let n = data.nrows();
    let p = joint_probabilities(&squared_distances(data), perplexity);

    let learning_rate = (n as f64 / EARLY_EXAGGERATION / 4.0).max(50.0);
    let mut y = random_init(n, seed);
    let mut update = Array2::<f64>::zeros((n, 2));
    let mut gains = Array2::<f64>::ones((n, 2));

    for iter in 0..max_iter {
        let (exaggeration, momentum) = if iter < EXAGGERATION_ITERS {
            (EARLY_EXAGGERATION, INITIAL_MOMENTUM)
        } else {
            (1.0, FINAL_MOMENTUM)
        };

        let (grad, kl) = gradient(&p, &y, exaggeration);

        for ((g, u), gain) in grad.iter().zip(update.iter_mut()).zip(gains.iter_mut()) {
            if g * *u < 0.0 {
                *gain += 0.2;
            } else {
                *gain = (*gain * 0.8).max(MIN_GAIN);
            }
            *u = momentum * *u - learning_rate * *gain * g;
        }
        y += &update;

        if let Some(mean) = y.mean_axis(Axis(0)) {
            y -= &mean;
        }

        if (iter + 1) % 100 == 0 {
            tracing::debug!(iter = iter + 1, kl, "t-SNE progress");
        }
    }

    y
}

fn squared_distances(data: &Array2<f64>) -> Array2<f64> {
    let n = data.nrows();
    let mut d = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let diff = &data.row(i) - &data.row(j);
            let dist = diff.dot(&diff);
            d[[i, j]] = dist;
            d[[j, i]] = dist;
        }
    }
    d
}

/// Symmetric joint probabilities `P`, normalised to sum to one.
fn joint_probabilities(distances: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let n = distances.nrows();
    let mut conditional = Array2::<f64>::zeros((n, n));
    let target_entropy = perplexity.ln();

    for i in 0..n {
        let row = conditional_row(distances.row(i), i, target_entropy);
        conditional.row_mut(i).assign(&row);
    }

    let mut p = &conditional + &conditional.t();
    let total = p.sum().max(MACHINE_EPSILON);
    p.mapv_inplace(|v| (v / total).max(MACHINE_EPSILON));
    for i in 0..n {
        p[[i, i]] = 0.0;
    }
    p
}

/// Binary search for the Gaussian precision giving row `i` the target entropy.
fn conditional_row(distances: ArrayView1<f64>, i: usize, target_entropy: f64) -> ndarray::Array1<f64> {
    // Entropy is shift invariant; shifting keeps exp() away from underflow.
    let nearest = distances
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, &d)| d)
        .fold(f64::INFINITY, f64::min);
    let shifted = distances.mapv(|d| d - nearest);

    let mut beta = 1.0;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;
    let mut row = ndarray::Array1::<f64>::zeros(distances.len());

    for _ in 0..BINARY_SEARCH_STEPS {
        for (j, (p, &d)) in row.iter_mut().zip(shifted.iter()).enumerate() {
            *p = if j == i { 0.0 } else { (-d * beta).exp() };
        }
        let sum = row.sum().max(MACHINE_EPSILON);
        let weighted: f64 = row.iter().zip(shifted.iter()).map(|(p, d)| p * d).sum();
        let entropy = sum.ln() + beta * weighted / sum;
        row /= sum;

        let diff = entropy - target_entropy;
        if diff.abs() < ENTROPY_TOLERANCE {
            break;
        }
        if diff > 0.0 {
            beta_min = beta;
            beta = if beta_max.is_infinite() {
                beta * 2.0
            } else {
                (beta + beta_max) / 2.0
            };
        } else {
            beta_max = beta;
            beta = if beta_min.is_infinite() {
                beta / 2.0
            } else {
                (beta + beta_min) / 2.0
            };
        }
    }

    row
}

fn random_init(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((n, 2), |_| INIT_STD * standard_normal(&mut rng))
}

/// Box-Muller transform.
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Gradient of KL(P || Q) w.r.t. `y`, plus the divergence itself.
fn gradient(p: &Array2<f64>, y: &Array2<f64>, exaggeration: f64) -> (Array2<f64>, f64) {
    let n = y.nrows();

    // Student-t kernel 1 / (1 + |yi - yj|²)
    let mut num = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = y[[i, 0]] - y[[j, 0]];
            let dy = y[[i, 1]] - y[[j, 1]];
            let k = 1.0 / (1.0 + dx * dx + dy * dy);
            num[[i, j]] = k;
            num[[j, i]] = k;
        }
    }
    let sum_num = num.sum().max(MACHINE_EPSILON);

    let mut grad = Array2::<f64>::zeros((n, 2));
    let mut kl = 0.0;
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let q = (num[[i, j]] / sum_num).max(MACHINE_EPSILON);
            let pij = p[[i, j]];
            kl += pij * (pij.max(MACHINE_EPSILON) / q).ln();

            let coeff = 4.0 * (exaggeration * pij - q) * num[[i, j]];
            grad[[i, 0]] += coeff * (y[[i, 0]] - y[[j, 0]]);
            grad[[i, 1]] += coeff * (y[[i, 1]] - y[[j, 1]]);
        }
    }

    (grad, kl)
}
