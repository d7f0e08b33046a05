use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::model::trunk::{DilateScale, TrunkSpec};
use crate::model::PoolKind;

/// Minimum clip duration heuristic: an entry is kept only when its frame
/// directory holds strictly more than `fps * MIN_CLIP_SECONDS` frames.
pub const MIN_CLIP_SECONDS: u32 = 20;

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub root_audio: PathBuf,
    pub root_frame: PathBuf,
    pub fps: u32,
    pub path_output: PathBuf,
    /// Fraction of accepted entries assigned to the training split, in (0, 1).
    pub trainset_ratio: f64,
    pub manifest_path: PathBuf,
    /// Videos sampled per category, truncated to the category size.
    pub num_samples: usize,
    /// Fixed RNG seed for reproducible sampling and shuffling.
    pub seed: Option<u64>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            root_audio: PathBuf::from("./data/audio"),
            root_frame: PathBuf::from("./data/frames"),
            fps: 8,
            path_output: PathBuf::from("./data"),
            trainset_ratio: 0.8,
            manifest_path: PathBuf::from("./data/video_info.json"),
            num_samples: 2,
            seed: None,
        }
    }
}

impl IndexerConfig {
    /// Frame-count threshold an entry must strictly exceed to be accepted.
    pub fn min_frame_count(&self) -> usize {
        self.fps as usize * MIN_CLIP_SECONDS as usize
    }
}

/// Convolutional backbone wrapper configuration, loadable from JSON.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BackboneConfig {
    pub trunk: TrunkSpec,
    #[serde(default = "default_feature_dim")]
    pub feature_dim: usize,
    #[serde(default = "default_conv_size")]
    pub conv_size: usize,
    #[serde(default)]
    pub pool: PoolKind,
    /// When set, the trunk descriptors are rewritten at construction time to
    /// trade late-stage stride for dilation.
    #[serde(default)]
    pub dilate_scale: Option<DilateScale>,
}

impl BackboneConfig {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io("read backbone config", e))?;
        serde_json::from_str(&data).map_err(|e| PipelineError::json("parse backbone config", e))
    }
}

/// Patch-based backbone wrapper configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PatchNetConfig {
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default = "default_patch_size")]
    pub patch_size: usize,
    #[serde(default = "default_frame_size")]
    pub frame_size: (usize, usize),
    #[serde(default = "default_feature_dim")]
    pub feature_dim: usize,
    #[serde(default)]
    pub pool: PoolKind,
}

impl Default for PatchNetConfig {
    fn default() -> Self {
        Self {
            hidden_size: default_hidden_size(),
            patch_size: default_patch_size(),
            frame_size: default_frame_size(),
            feature_dim: default_feature_dim(),
            pool: PoolKind::default(),
        }
    }
}

fn default_feature_dim() -> usize {
    64
}
fn default_conv_size() -> usize {
    3
}
fn default_hidden_size() -> usize {
    768
}
fn default_patch_size() -> usize {
    16
}
fn default_frame_size() -> (usize, usize) {
    (224, 224)
}

/// Enhancement applied to the 3-channel PCA projection before blending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Enhancement {
    /// Direct RGB blend of the raw projection.
    None,
    /// Attenuate weak activations below `threshold` by `attenuation`, then
    /// apply a power-law contrast curve with exponent `gamma`.
    PixelEmphasis {
        threshold: f32,
        attenuation: f32,
        gamma: f32,
    },
    /// Split the projection into two k-means clusters and tint each toward a
    /// distinct hue.
    ClusterTint,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualizerConfig {
    pub enhancement: Enhancement,
    /// Overlay opacity in the blended panel.
    pub alpha: f32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            enhancement: Enhancement::PixelEmphasis {
                threshold: 0.4,
                attenuation: 0.3,
                gamma: 1.5,
            },
            alpha: 0.65,
        }
    }
}
