use candle_core::{Module, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, VarBuilder};

use crate::error::PipelineError;
use crate::model::layers::{adaptive_pool_hw, bilinear_resize};
use crate::model::{PatchBackbone, PoolKind};

/// Non-overlapping patch embedding: a convolution with kernel = stride =
/// patch size, flattened to a `(B, num_patches, hidden)` sequence.
pub struct PatchEmbed {
    proj: Conv2d,
    hidden_size: usize,
    patch_size: usize,
    frame_size: (usize, usize),
}

impl PatchEmbed {
    pub fn load(
        in_channels: usize,
        hidden_size: usize,
        patch_size: usize,
        frame_size: (usize, usize),
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let cfg = Conv2dConfig {
            stride: patch_size,
            ..Default::default()
        };
        let proj = candle_nn::conv2d(in_channels, hidden_size, patch_size, cfg, vb.pp("proj"))?;
        Ok(Self {
            proj,
            hidden_size,
            patch_size,
            frame_size,
        })
    }
}

impl PatchBackbone for PatchEmbed {
    fn forward_patches(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        // (B, hidden, gh, gw) -> (B, gh * gw, hidden)
        let h = self.proj.forward(xs)?;
        h.flatten_from(2)?.transpose(1, 2)?.contiguous()
    }

    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn patch_size(&self) -> usize {
        self.patch_size
    }

    fn frame_size(&self) -> (usize, usize) {
        self.frame_size
    }
}

/// Patch-based backbone wrapper: patch embeddings projected to the feature
/// dimension, then either pooled to one vector per clip or upsampled back to
/// a dense per-pixel map.
pub struct PatchNet {
    backbone: Box<dyn PatchBackbone>,
    projector: Linear,
    pool: PoolKind,
    feature_dim: usize,
}

impl PatchNet {
    pub fn load(
        backbone: Box<dyn PatchBackbone>,
        feature_dim: usize,
        pool: PoolKind,
        vb: VarBuilder,
    ) -> Result<Self, PipelineError> {
        let projector =
            candle_nn::linear(backbone.hidden_size(), feature_dim, vb.pp("feature_projector"))
                .map_err(|e| PipelineError::runtime("build feature projector", e))?;
        Ok(Self {
            backbone,
            projector,
            pool,
            feature_dim,
        })
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Forward over `(B, C, T, H, W)`. Frame height/width must exactly match
    /// the backbone's configured frame size.
    ///
    /// Pooled output is `(B, feature_dim)`: temporal avg/max across frames,
    /// then adaptive average pooling across the patch grid. Unpooled output
    /// is `(B, feature_dim, T, H, W)`: the patch grid bilinearly upsampled
    /// back to frame resolution.
    pub fn forward(&self, xs: &Tensor, pool: bool) -> Result<Tensor, PipelineError> {
        let (b, c, t, h, w) = xs.dims5().map_err(|_| {
            PipelineError::invalid_input(format!(
                "patch input must be (B, C, T, H, W), got shape {:?}",
                xs.dims()
            ))
        })?;
        let (fh, fw) = self.backbone.frame_size();
        if (h, w) != (fh, fw) {
            return Err(PipelineError::invalid_input(format!(
                "input frames are {h}x{w} but the backbone expects {fh}x{fw}"
            )));
        }

        let folded = xs
            .permute((0, 2, 1, 3, 4))
            .and_then(|x| x.contiguous())
            .and_then(|x| x.reshape((b * t, c, h, w)))
            .map_err(|e| PipelineError::runtime("fold time into batch", e))?;

        let patches = self
            .backbone
            .forward_patches(&folded)
            .map_err(|e| PipelineError::runtime("patch embedding", e))?;
        let feats = self
            .projector
            .forward(&patches)
            .map_err(|e| PipelineError::runtime("feature projection", e))?;

        let p = self.backbone.patch_size();
        let (gh, gw) = (h / p, w / p);
        let grid = feats
            .reshape((b, t, gh, gw, self.feature_dim))
            .map_err(|e| PipelineError::runtime("reshape patch grid", e))?;

        if pool {
            // Temporal reduction uses the configured policy; the final grid
            // reduction is adaptive average pooling, matching the conv head.
            let over_time = match self.pool {
                PoolKind::Avg => grid.mean(1),
                PoolKind::Max => grid.max(1),
            }
            .map_err(|e| PipelineError::runtime("temporal pool", e))?;
            let channels_first = over_time
                .permute((0, 3, 1, 2))
                .and_then(|x| x.contiguous())
                .map_err(|e| PipelineError::runtime("grid to channels-first", e))?;
            adaptive_pool_hw(&channels_first, PoolKind::Avg)
                .map_err(|e| PipelineError::runtime("grid adaptive pool", e))
        } else {
            let maps = grid
                .permute((0, 1, 4, 2, 3))
                .and_then(|x| x.contiguous())
                .map_err(|e| PipelineError::runtime("grid to channels-first", e))?;
            let dense = bilinear_resize(&maps, h, w)
                .map_err(|e| PipelineError::runtime("bilinear upsample", e))?;
            dense
                .permute((0, 2, 1, 3, 4))
                .and_then(|x| x.contiguous())
                .map_err(|e| PipelineError::runtime("restore time axis", e))
        }
    }
}
