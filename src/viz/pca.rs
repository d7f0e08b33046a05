use ndarray::{Array1, Array2};

use crate::error::PipelineError;

/// Epsilon guarding the min/max normalization against constant input.
pub(crate) const NORM_EPS: f32 = 1e-8;

/// In-place global min/max normalization to [0, 1].
pub(crate) fn normalize_unit(a: &mut Array2<f32>) {
    let min = a.iter().copied().fold(f32::INFINITY, f32::min);
    let max = a.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min + NORM_EPS;
    a.mapv_inplace(|v| (v - min) / range);
}

/// Projects `(n, d)` rows onto their top `k` principal components,
/// returning the `(n, k)` score matrix.
///
/// Uses the Gram-matrix route: with far more embedding dimensions than
/// spatial positions (e.g. 196 x 65536), eigendecomposing the `n x n` Gram
/// matrix of the centered rows is equivalent to the covariance route, and
/// the scores are simply eigenvector * sqrt(eigenvalue).
pub(crate) fn pca_project(x: &Array2<f32>, k: usize) -> Result<Array2<f32>, PipelineError> {
    let (n, _d) = x.dim();
    if n == 0 {
        return Err(PipelineError::invalid_input(
            "PCA input must have at least one row",
        ));
    }
    if k > n {
        return Err(PipelineError::invalid_input(format!(
            "cannot extract {k} components from {n} rows"
        )));
    }

    let mean: Array1<f32> = x
        .mean_axis(ndarray::Axis(0))
        .ok_or_else(|| PipelineError::invalid_input("PCA input must have at least one row"))?;
    let centered = x - &mean.insert_axis(ndarray::Axis(0));
    let gram = centered.dot(&centered.t());

    let (eigenvalues, eigenvectors) = symmetric_eigen(&gram);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigenvalues[b]
            .partial_cmp(&eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut scores = Array2::<f32>::zeros((n, k));
    for (j, &idx) in order.iter().take(k).enumerate() {
        let scale = eigenvalues[idx].max(0.0).sqrt();
        for i in 0..n {
            scores[[i, j]] = eigenvectors[[i, idx]] * scale;
        }
    }
    Ok(scores)
}

/// Cyclic Jacobi eigendecomposition of a real symmetric matrix.
/// Returns (eigenvalues, column eigenvectors), unsorted.
fn symmetric_eigen(a: &Array2<f32>) -> (Vec<f32>, Array2<f32>) {
    const MAX_SWEEPS: usize = 64;
    const OFF_DIAG_TOL: f32 = 1e-9;

    let n = a.nrows();
    let mut d = a.clone();
    let mut v = Array2::<f32>::eye(n);

    for _sweep in 0..MAX_SWEEPS {
        let off_diag: f32 = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .map(|(i, j)| d[[i, j]] * d[[i, j]])
            .sum();
        if off_diag.sqrt() < OFF_DIAG_TOL {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if d[[p, q]].abs() < OFF_DIAG_TOL {
                    continue;
                }
                let theta = 0.5 * (2.0 * d[[p, q]]).atan2(d[[q, q]] - d[[p, p]]);
                let (s, c) = theta.sin_cos();

                let d_pp = d[[p, p]];
                let d_qq = d[[q, q]];
                let d_pq = d[[p, q]];
                d[[p, p]] = c * c * d_pp + s * s * d_qq - 2.0 * s * c * d_pq;
                d[[q, q]] = s * s * d_pp + c * c * d_qq + 2.0 * s * c * d_pq;
                d[[p, q]] = 0.0;
                d[[q, p]] = 0.0;

                for k in 0..n {
                    if k != p && k != q {
                        let d_pk = d[[p, k]];
                        let d_qk = d[[q, k]];
                        d[[p, k]] = c * d_pk - s * d_qk;
                        d[[k, p]] = d[[p, k]];
                        d[[q, k]] = s * d_pk + c * d_qk;
                        d[[k, q]] = d[[q, k]];
                    }
                }
                for k in 0..n {
                    let v_kp = v[[k, p]];
                    let v_kq = v[[k, q]];
                    v[[k, p]] = c * v_kp - s * v_kq;
                    v[[k, q]] = s * v_kp + c * v_kq;
                }
            }
        }
    }

    (d.diag().to_vec(), v)
}
