use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::Array2;

use crate::error::PipelineError;

/// Hues the two clusters are pulled toward: warm for one group, cool for the
/// other, so source and background separate visually.
const CLUSTER_TINTS: [[f32; 3]; 2] = [[1.0, 0.35, 0.2], [0.2, 0.45, 1.0]];

/// Splits the 3-channel projection into two k-means groups and tints each
/// toward a distinct hue. Caller renormalizes afterwards.
pub(crate) fn cluster_tint(features: &Array2<f32>) -> Result<Array2<f32>, PipelineError> {
    let model = KMeans::params(2)
        .max_n_iterations(100)
        .fit(&DatasetBase::from(features.clone()))
        .map_err(|e| PipelineError::runtime("k-means fit", e))?;
    let labels = model.predict(features);

    let mut tinted = features.clone();
    for (i, &label) in labels.iter().enumerate() {
        let tint = CLUSTER_TINTS[label.min(1)];
        for c in 0..tinted.ncols().min(3) {
            tinted[[i, c]] = 0.5 * tinted[[i, c]] + 0.5 * tint[c];
        }
    }
    Ok(tinted)
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    #[test]
    fn tint_separates_two_blobs() {
        // Two groups: near the origin and near (1, 1, 1).
        let mut data = Vec::new();
        for i in 0..8 {
            let jitter = i as f32 * 0.005;
            data.extend_from_slice(&[jitter, jitter, jitter]);
        }
        for i in 0..8 {
            let jitter = 1.0 - i as f32 * 0.005;
            data.extend_from_slice(&[jitter, jitter, jitter]);
        }
        let features = Array2::from_shape_vec((16, 3), data).unwrap();
        let tinted = cluster_tint(&features).expect("k-means");

        // Rows within a blob get the same tint; the blobs differ. Compare the
        // red channel shift of the first and last rows.
        let first = tinted[[0, 0]] - 0.5 * features[[0, 0]];
        let second = tinted[[1, 0]] - 0.5 * features[[1, 0]];
        let last = tinted[[15, 0]] - 0.5 * features[[15, 0]];
        assert!((first - second).abs() < 1e-4);
        assert!((first - last).abs() > 0.1);
    }

    #[test]
    fn tint_keeps_shape() {
        let features = Array2::from_elem((9, 3), 0.4f32);
        let tinted = cluster_tint(&features).expect("k-means on constant data");
        assert_eq!(tinted.dim(), (9, 3));
        for &v in tinted.iter() {
            assert!(v.is_finite());
        }
    }
}
