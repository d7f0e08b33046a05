use candle_core::{Module, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, VarBuilder};

use crate::error::PipelineError;
use crate::model::layers::{adaptive_pool_hw, adaptive_pool_thw};
use crate::model::{ImageBackbone, PoolKind};

/// Convolutional backbone wrapper: trunk features followed by a learned
/// convolutional projection to the target feature dimension, with optional
/// adaptive pooling down to one cell.
pub struct FrameNet {
    backbone: Box<dyn ImageBackbone>,
    fc: Conv2d,
    pool: PoolKind,
    feature_dim: usize,
}

impl FrameNet {
    pub fn load(
        backbone: Box<dyn ImageBackbone>,
        feature_dim: usize,
        conv_size: usize,
        pool: PoolKind,
        vb: VarBuilder,
    ) -> Result<Self, PipelineError> {
        let cfg = Conv2dConfig {
            padding: conv_size / 2,
            ..Default::default()
        };
        let fc = candle_nn::conv2d(backbone.out_channels(), feature_dim, conv_size, cfg, vb.pp("fc"))
            .map_err(|e| PipelineError::runtime("build projection conv", e))?;
        Ok(Self {
            backbone,
            fc,
            pool,
            feature_dim,
        })
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Single-frame forward over `(B, C, H, W)`. Pooled output is
    /// `(B, feature_dim)`; unpooled is `(B, feature_dim, H', W')` with the
    /// spatial dims set by the trunk stride.
    pub fn forward(&self, xs: &Tensor, pool: bool) -> Result<Tensor, PipelineError> {
        let h = self
            .backbone
            .forward_features(xs)
            .map_err(|e| PipelineError::runtime("trunk forward", e))?;
        let h = self
            .fc
            .forward(&h)
            .map_err(|e| PipelineError::runtime("projection forward", e))?;
        if !pool {
            return Ok(h);
        }
        adaptive_pool_hw(&h, self.pool).map_err(|e| PipelineError::runtime("adaptive pool", e))
    }

    /// Multi-frame forward over `(B, C, T, H, W)`: the time axis is folded
    /// into the batch axis for trunk processing and restored afterward.
    /// Pooled output is `(B, feature_dim)` via 3-D adaptive pooling; unpooled
    /// is `(B, feature_dim, T, H', W')`.
    pub fn forward_multiframe(&self, xs: &Tensor, pool: bool) -> Result<Tensor, PipelineError> {
        let (b, c, t, h, w) = xs.dims5().map_err(|_| {
            PipelineError::invalid_input(format!(
                "multi-frame input must be (B, C, T, H, W), got shape {:?}",
                xs.dims()
            ))
        })?;

        let folded = xs
            .permute((0, 2, 1, 3, 4))
            .and_then(|x| x.contiguous())
            .and_then(|x| x.reshape((b * t, c, h, w)))
            .map_err(|e| PipelineError::runtime("fold time into batch", e))?;

        let feat = self.forward(&folded, false)?;
        let (_, f, fh, fw) = feat
            .dims4()
            .map_err(|e| PipelineError::runtime("feature map dims", e))?;

        let feat = feat
            .reshape((b, t, f, fh, fw))
            .and_then(|x| x.permute((0, 2, 1, 3, 4)))
            .and_then(|x| x.contiguous())
            .map_err(|e| PipelineError::runtime("restore time axis", e))?;

        if !pool {
            return Ok(feat);
        }
        adaptive_pool_thw(&feat, self.pool)
            .map_err(|e| PipelineError::runtime("3d adaptive pool", e))
    }

    /// Stacks per-frame `(B, C, H, W)` tensors along a new time axis and
    /// delegates to [`forward_multiframe`](Self::forward_multiframe). A stack
    /// that does not come out exactly 5-D is a fatal input-shape error.
    pub fn forward_frames(&self, frames: &[Tensor], pool: bool) -> Result<Tensor, PipelineError> {
        if frames.is_empty() {
            return Err(PipelineError::invalid_input(
                "frame sequence must not be empty",
            ));
        }
        let stacked =
            Tensor::stack(frames, 2).map_err(|e| PipelineError::runtime("stack frames", e))?;
        if stacked.dims().len() != 5 {
            return Err(PipelineError::invalid_input(format!(
                "stacked input must be 5-D (B, C, T, H, W), got shape {:?}",
                stacked.dims()
            )));
        }
        self.forward_multiframe(&stacked, pool)
    }
}

/// Plain pooled variant: trunk features reduced straight to
/// `(B, out_channels)` with adaptive average pooling, no projection.
pub struct GlobalPoolNet {
    backbone: Box<dyn ImageBackbone>,
}

impl GlobalPoolNet {
    pub fn new(backbone: Box<dyn ImageBackbone>) -> Self {
        Self { backbone }
    }

    pub fn forward(&self, xs: &Tensor) -> Result<Tensor, PipelineError> {
        let h = self
            .backbone
            .forward_features(xs)
            .map_err(|e| PipelineError::runtime("trunk forward", e))?;
        adaptive_pool_hw(&h, PoolKind::Avg)
            .map_err(|e| PipelineError::runtime("adaptive pool", e))
    }
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};
    use candle_nn::VarBuilder;

    use super::*;
    use crate::model::trunk::{tests::tiny_spec, ConvTrunk};

    fn tiny_frame_net(pool: PoolKind) -> FrameNet {
        let device = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &device);
        let trunk = ConvTrunk::load(tiny_spec(), vb.pp("trunk")).expect("trunk");
        FrameNet::load(Box::new(trunk), 12, 3, pool, vb).expect("frame net")
    }

    #[test]
    fn single_frame_pooled_shape() {
        let net = tiny_frame_net(PoolKind::Max);
        let xs = Tensor::zeros((2, 3, 32, 32), DType::F32, &Device::Cpu).unwrap();
        let out = net.forward(&xs, true).expect("forward");
        assert_eq!(out.dims(), &[2, 12]);
    }

    #[test]
    fn single_frame_unpooled_keeps_spatial_map() {
        let net = tiny_frame_net(PoolKind::Avg);
        let xs = Tensor::zeros((2, 3, 32, 32), DType::F32, &Device::Cpu).unwrap();
        let out = net.forward(&xs, false).expect("forward");
        assert_eq!(out.dims(), &[2, 12, 8, 8]);
    }

    #[test]
    fn multiframe_pooled_shape() {
        let net = tiny_frame_net(PoolKind::Max);
        let xs = Tensor::zeros((2, 3, 4, 32, 32), DType::F32, &Device::Cpu).unwrap();
        let out = net.forward_multiframe(&xs, true).expect("forward");
        assert_eq!(out.dims(), &[2, 12]);
    }

    #[test]
    fn multiframe_unpooled_restores_time_axis() {
        let net = tiny_frame_net(PoolKind::Avg);
        let xs = Tensor::zeros((2, 3, 4, 32, 32), DType::F32, &Device::Cpu).unwrap();
        let out = net.forward_multiframe(&xs, false).expect("forward");
        assert_eq!(out.dims(), &[2, 12, 4, 8, 8]);
    }

    #[test]
    fn multiframe_rejects_wrong_rank() {
        let net = tiny_frame_net(PoolKind::Max);
        let xs = Tensor::zeros((2, 3, 32, 32), DType::F32, &Device::Cpu).unwrap();
        let err = net
            .forward_multiframe(&xs, true)
            .expect_err("4-D input must be rejected");
        assert!(err.to_string().contains("must be (B, C, T, H, W)"));
    }

    #[test]
    fn frame_stack_produces_multiframe_result() {
        let net = tiny_frame_net(PoolKind::Max);
        let frame = Tensor::zeros((2, 3, 32, 32), DType::F32, &Device::Cpu).unwrap();
        let out = net
            .forward_frames(&[frame.clone(), frame.clone(), frame], true)
            .expect("forward");
        assert_eq!(out.dims(), &[2, 12]);
    }

    #[test]
    fn frame_stack_rejects_non_5d_result() {
        let net = tiny_frame_net(PoolKind::Max);
        // 3-D frames stack to 4-D, which must be fatal.
        let frame = Tensor::zeros((3, 32, 32), DType::F32, &Device::Cpu).unwrap();
        let err = net
            .forward_frames(&[frame.clone(), frame], true)
            .expect_err("non-5-D stack must be rejected");
        assert!(err.to_string().contains("5-D"));
    }

    #[test]
    fn frame_stack_rejects_empty_sequence() {
        let net = tiny_frame_net(PoolKind::Max);
        assert!(net.forward_frames(&[], true).is_err());
    }

    #[test]
    fn global_pool_net_keeps_trunk_channels() {
        let device = Device::Cpu;
        let vb = VarBuilder::zeros(DType::F32, &device);
        let trunk = ConvTrunk::load(tiny_spec(), vb).expect("trunk");
        let net = GlobalPoolNet::new(Box::new(trunk));
        let xs = Tensor::zeros((2, 3, 32, 32), DType::F32, &device).unwrap();
        let out = net.forward(&xs).expect("forward");
        assert_eq!(out.dims(), &[2, 16]);
    }
}
