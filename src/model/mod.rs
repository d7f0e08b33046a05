pub mod frame_net;
pub(crate) mod layers;
pub mod patch_net;
pub mod trunk;

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use crate::config::{BackboneConfig, PatchNetConfig};
use crate::error::PipelineError;

pub use frame_net::{FrameNet, GlobalPoolNet};
pub use patch_net::{PatchEmbed, PatchNet};
pub use trunk::ConvTrunk;

/// Adaptive (output-size-1) pooling policy shared by every wrapper variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolKind {
    Avg,
    Max,
}

impl Default for PoolKind {
    fn default() -> Self {
        Self::Max
    }
}

/// Convolutional trunk seam: maps `(B, C, H, W)` pixels to a spatial feature
/// map `(B, out_channels, H / total_stride, W / total_stride)`.
pub trait ImageBackbone: Send + Sync {
    fn forward_features(&self, xs: &Tensor) -> candle_core::Result<Tensor>;
    fn out_channels(&self) -> usize;
    fn total_stride(&self) -> usize;
}

/// Patch-embedding seam: maps `(B, C, H, W)` pixels to a patch sequence
/// `(B, num_patches, hidden_size)`.
pub trait PatchBackbone: Send + Sync {
    fn forward_patches(&self, xs: &Tensor) -> candle_core::Result<Tensor>;
    fn hidden_size(&self) -> usize;
    fn patch_size(&self) -> usize;
    /// `(height, width)` the backbone was configured for; inputs must match
    /// exactly.
    fn frame_size(&self) -> (usize, usize);
}

pub fn select_device(device: &str) -> Result<Device, PipelineError> {
    match device {
        "cuda" => Device::new_cuda(0).map_err(|e| PipelineError::runtime("CUDA init", e)),
        _ => Ok(Device::Cpu),
    }
}

pub fn var_builder_from_safetensors(
    model_path: &Path,
    device: &Device,
) -> Result<VarBuilder<'static>, PipelineError> {
    let model_data =
        std::fs::read(model_path).map_err(|e| PipelineError::io("read safetensors", e))?;
    VarBuilder::from_buffered_safetensors(model_data, DType::F32, device)
        .map_err(|e| PipelineError::runtime("load safetensors", e))
}

/// Builds the convolutional wrapper from its config, applying the dilation
/// rewrite to the trunk descriptors before any weights are bound.
pub fn build_frame_net(cfg: &BackboneConfig, vb: VarBuilder) -> Result<FrameNet, PipelineError> {
    let spec = match cfg.dilate_scale {
        Some(scale) => cfg.trunk.clone().dilated(scale),
        None => cfg.trunk.clone(),
    };
    let trunk = ConvTrunk::load(spec, vb.pp("trunk"))
        .map_err(|e| PipelineError::runtime("build conv trunk", e))?;

    tracing::info!(
        out_channels = trunk.out_channels(),
        total_stride = trunk.total_stride(),
        feature_dim = cfg.feature_dim,
        dilated = cfg.dilate_scale.is_some(),
        "conv backbone loaded"
    );

    FrameNet::load(Box::new(trunk), cfg.feature_dim, cfg.conv_size, cfg.pool, vb)
}

pub fn build_patch_net(cfg: &PatchNetConfig, vb: VarBuilder) -> Result<PatchNet, PipelineError> {
    let embed = PatchEmbed::load(
        3,
        cfg.hidden_size,
        cfg.patch_size,
        cfg.frame_size,
        vb.pp("patch_embed"),
    )
    .map_err(|e| PipelineError::runtime("build patch embedding", e))?;

    tracing::info!(
        hidden_size = cfg.hidden_size,
        patch_size = cfg.patch_size,
        feature_dim = cfg.feature_dim,
        "patch backbone loaded"
    );

    PatchNet::load(Box::new(embed), cfg.feature_dim, cfg.pool, vb)
}
