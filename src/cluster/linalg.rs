//! Distances and the dense decompositions needed by the clustering algorithms.
//!
//! Eigen, QR and SVD decompositions go through nalgebra, matrices are converted at the boundary.

use nalgebra::{DMatrix, SymmetricEigen, SVD};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::errors::StudyError;

const EIGEN_MAX_ITER: usize = 10_000;
// above this dimension top_eigen switches to subspace iteration
const FULL_EIGEN_MAX_DIM: usize = 200;
const SUBSPACE_MAX_ITER: usize = 500;

/// squared L2 distance
pub fn squared_distance(v1: &ArrayView1<f64>, v2: &ArrayView1<f64>) -> f64 {
    assert_eq!(v1.len(), v2.len());
    v1.iter().zip(v2.iter()).map(|(a, b)| (a - b) * (a - b)).sum()
}

/// L2 distance
pub fn euclidean_distance(v1: &ArrayView1<f64>, v2: &ArrayView1<f64>) -> f64 {
    squared_distance(v1, v2).sqrt()
}

/// matrix of squared distances between rows of data
pub fn pairwise_squared_distances(data: &ArrayView2<f64>) -> Array2<f64> {
    let nbrow = data.nrows();
    let mut dist = Array2::<f64>::zeros((nbrow, nbrow));
    dist.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut row)| {
            let ri = data.row(i);
            for j in 0..nbrow {
                if j != i {
                    row[j] = squared_distance(&ri, &data.row(j));
                }
            }
        });
    dist
} // end of pairwise_squared_distances

/// matrix of distances between rows of data
pub fn pairwise_distances(data: &ArrayView2<f64>) -> Array2<f64> {
    pairwise_squared_distances(data).mapv(f64::sqrt)
}

/// rank of the max of a slice, the first one in case of ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, v) in values.iter().enumerate() {
        if *v > best_val {
            best = i;
            best_val = *v;
        }
    }
    best
}

/// rank of the min of a slice, the first one in case of ties.
pub fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_val = f64::INFINITY;
    for (i, v) in values.iter().enumerate() {
        if *v < best_val {
            best = i;
            best_val = *v;
        }
    }
    best
}

/// ndarray to nalgebra
pub fn to_dmatrix(mat: &ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::<f64>::from_fn(mat.nrows(), mat.ncols(), |i, j| mat[[i, j]])
}

/// nalgebra to ndarray
pub fn from_dmatrix(mat: &DMatrix<f64>) -> Array2<f64> {
    Array2::<f64>::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

/// Eigen decomposition of a symetric matrix.
/// Returns eigenvalues in decreasing order and eigenvectors as columns in the same order.
pub fn symetric_eigen(mat: &ArrayView2<f64>) -> anyhow::Result<(Array1<f64>, Array2<f64>)> {
    assert_eq!(mat.nrows(), mat.ncols());
    let eigen = SymmetricEigen::try_new(to_dmatrix(mat), f64::EPSILON, EIGEN_MAX_ITER).ok_or_else(|| {
        StudyError::clustering(format!("symetric eigen decomposition did not converge, dim {}", mat.nrows()))
    })?;
    // nalgebra does not order eigenvalues
    let mut order: Vec<usize> = (0..eigen.eigenvalues.len()).collect();
    order.sort_by(|i, j| {
        eigen.eigenvalues[*j]
            .partial_cmp(&eigen.eigenvalues[*i])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let values = Array1::from_iter(order.iter().map(|i| eigen.eigenvalues[*i]));
    let vectors = from_dmatrix(&eigen.eigenvectors).select(Axis(1), &order);
    Ok((values, vectors))
} // end of symetric_eigen

/// orthonormal basis of the range of the columns of q, by a thin QR decomposition
pub fn orthonormalize_columns(q: &Array2<f64>) -> Array2<f64> {
    from_dmatrix(&to_dmatrix(&q.view()).qr().q())
}

/// Top k eigenpairs of a symetric matrix whose spectrum is in [-1, 1].
/// For small matrices we run a full decomposition, for larger ones a subspace iteration
/// on mat + I followed by a Rayleigh-Ritz projection.
pub fn top_eigen(
    mat: &Array2<f64>,
    k: usize,
    rng: &mut Xoshiro256PlusPlus,
) -> anyhow::Result<(Array1<f64>, Array2<f64>)> {
    let n = mat.nrows();
    let k = k.min(n);
    if n <= FULL_EIGEN_MAX_DIM {
        let (values, vectors) = symetric_eigen(&mat.view())?;
        return Ok((values.slice(s![..k]).to_owned(), vectors.slice(s![.., ..k]).to_owned()));
    }
    let shifted = mat + &Array2::<f64>::eye(n);
    let mut q = orthonormalize_columns(&Array2::<f64>::from_shape_fn((n, k), |_| rng.sample(StandardNormal)));
    for iter in 0..SUBSPACE_MAX_ITER {
        let z = orthonormalize_columns(&shifted.dot(&q));
        // columns converge up to sign, compare subspaces through |q^t z|
        let overlap = q.t().dot(&z);
        let converged = (0..k).all(|j| (overlap.column(j).mapv(|x| x * x).sum() - 1.).abs() < 1.0E-10);
        q = z;
        if converged {
            log::debug!("top_eigen, subspace iteration converged at iter {}", iter);
            break;
        }
    }
    let small = q.t().dot(mat).dot(&q);
    let (values, w) = symetric_eigen(&small.view())?;
    Ok((values, q.dot(&w)))
} // end of top_eigen

/// Singular value decomposition of a matrix.
/// Returns (u, s, v) with mat = u diag(s) v^t, None if the decomposition does not converge.
pub fn svd(mat: &Array2<f64>) -> Option<(Array2<f64>, Array1<f64>, Array2<f64>)> {
    let svd = SVD::try_new(to_dmatrix(&mat.view()), true, true, f64::EPSILON, EIGEN_MAX_ITER)?;
    let u = from_dmatrix(svd.u.as_ref()?);
    let v = from_dmatrix(svd.v_t.as_ref()?).reversed_axes();
    let s = Array1::from_iter(svd.singular_values.iter().cloned());
    Some((u, s, v))
} // end of svd

// end of mod tests
