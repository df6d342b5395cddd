//! Linear projection onto the top two principal components.
//!
//! Eigenvectors of the covariance are found by power iteration with
//! deflation, multiplying through the centred data so the d×d covariance is
//! never materialised.

use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const POWER_ITERS: usize = 200;
const TOLERANCE: f64 = 1e-10;

pub fn fit(data: &Array2<f64>, seed: u64) -> Array2<f64> {
    let n = data.nrows();
    let mut centred = data.to_owned();
    if let Some(mean) = data.mean_axis(Axis(0)) {
        centred -= &mean;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let first = principal_axis(&centred, &[], &mut rng);
    let second = principal_axis(&centred, std::slice::from_ref(&first), &mut rng);

    let mut out = Array2::<f64>::zeros((n, 2));
    out.column_mut(0).assign(&centred.dot(&first));
    out.column_mut(1).assign(&centred.dot(&second));
    out
}

/// Dominant eigenvector of `XᵀX` orthogonal to every vector in `found`.
fn principal_axis(x: &Array2<f64>, found: &[Array1<f64>], rng: &mut impl Rng) -> Array1<f64> {
    let dims = x.ncols();
    let mut v = Array1::from_shape_fn(dims, |_| rng.gen::<f64>() - 0.5);
    orthogonalise(&mut v, found);
    if !normalise(&mut v) {
        return v;
    }

    for _ in 0..POWER_ITERS {
        let mut next = x.t().dot(&x.dot(&v));
        orthogonalise(&mut next, found);
        if !normalise(&mut next) {
            // remaining variance is zero; any orthogonal direction will do
            return v;
        }
        let delta = (&next - &v).mapv(f64::abs).sum();
        v = next;
        if delta < TOLERANCE {
            break;
        }
    }

    // fix the sign so the largest component is positive
    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |acc, c| if c.abs() > acc.abs() { c } else { acc });
    if pivot < 0.0 {
        v.mapv_inplace(|c| -c);
    }
    v
}

fn orthogonalise(v: &mut Array1<f64>, basis: &[Array1<f64>]) {
    for b in basis {
        let proj = v.dot(b);
        v.scaled_add(-proj, b);
    }
}

fn normalise(v: &mut Array1<f64>) -> bool {
    let norm = v.dot(v).sqrt();
    if norm > TOLERANCE {
        *v /= norm;
        true
    } else {
        false
    }
}
