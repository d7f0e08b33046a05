use candle_core::{Tensor, D};

use crate::model::PoolKind;

/// Adaptive output-size-1 pooling over the trailing (H, W) dims:
/// `(B, C, H, W)` -> `(B, C)`.
pub(crate) fn adaptive_pool_hw(xs: &Tensor, kind: PoolKind) -> candle_core::Result<Tensor> {
    match kind {
        PoolKind::Avg => xs.mean(D::Minus1)?.mean(D::Minus1),
        PoolKind::Max => xs.max(D::Minus1)?.max(D::Minus1),
    }
}

/// Adaptive output-size-1 pooling over the trailing (T, H, W) dims:
/// `(B, C, T, H, W)` -> `(B, C)`.
pub(crate) fn adaptive_pool_thw(xs: &Tensor, kind: PoolKind) -> candle_core::Result<Tensor> {
    let flat = xs.flatten_from(2)?;
    match kind {
        PoolKind::Avg => flat.mean(D::Minus1),
        PoolKind::Max => flat.max(D::Minus1),
    }
}

/// Row-major `(out_len, in_len)` interpolation matrix for 1-D bilinear
/// resampling with `align_corners = false` semantics. Each row is a convex
/// combination of at most two source positions.
pub(crate) fn bilinear_weights(out_len: usize, in_len: usize) -> Vec<f32> {
    let mut weights = vec![0f32; out_len * in_len];
    let scale = in_len as f32 / out_len as f32;
    for o in 0..out_len {
        let src = ((o as f32 + 0.5) * scale - 0.5).clamp(0.0, (in_len - 1) as f32);
        let lo = src.floor() as usize;
        let hi = (lo + 1).min(in_len - 1);
        let frac = src - lo as f32;
        weights[o * in_len + lo] += 1.0 - frac;
        weights[o * in_len + hi] += frac;
    }
    weights
}

/// Bilinear resize of the trailing (H, W) dims of an arbitrarily-batched
/// tensor, expressed as two interpolation matmuls: `L @ X @ R^T`.
pub(crate) fn bilinear_resize(
    xs: &Tensor,
    out_h: usize,
    out_w: usize,
) -> candle_core::Result<Tensor> {
    let dims = xs.dims().to_vec();
    let (h, w) = (dims[dims.len() - 2], dims[dims.len() - 1]);
    let batch: usize = dims[..dims.len() - 2].iter().product();
    let flat = xs.reshape((batch, h, w))?;

    let left = Tensor::from_vec(bilinear_weights(out_h, h), (out_h, h), xs.device())?;
    let right = Tensor::from_vec(bilinear_weights(out_w, w), (out_w, w), xs.device())?;

    let rows = left.unsqueeze(0)?.broadcast_matmul(&flat)?;
    let resized = rows.broadcast_matmul(&right.t()?.unsqueeze(0)?)?;

    let mut out_dims = dims[..dims.len() - 2].to_vec();
    out_dims.push(out_h);
    out_dims.push(out_w);
    resized.reshape(out_dims)
}
