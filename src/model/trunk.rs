use candle_core::{Module, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, VarBuilder};

use crate::model::ImageBackbone;

/// Descriptor for one trunk convolution. The dilation rewrite operates on
/// these descriptors, never on constructed layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct ConvSpec {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
    pub stride: usize,
    #[serde(default)]
    pub padding: usize,
    #[serde(default = "default_dilation")]
    pub dilation: usize,
}

fn default_dilation() -> usize {
    1
}

/// Enumerated trunk layout: stages of convolutions, outermost first. The last
/// one or two stages are the rewrite targets for the dilated variant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct TrunkSpec {
    pub stages: Vec<Vec<ConvSpec>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(try_from = "u64")]
pub enum DilateScale {
    Eight,
    Sixteen,
}

impl TryFrom<u64> for DilateScale {
    type Error = String;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            other => Err(format!("unsupported dilate scale {other}, expected 8 or 16")),
        }
    }
}

impl TrunkSpec {
    pub fn out_channels(&self) -> usize {
        self.stages
            .iter()
            .rev()
            .find_map(|stage| stage.last())
            .map(|conv| conv.out_channels)
            .unwrap_or(0)
    }

    pub fn total_stride(&self) -> usize {
        self.stages
            .iter()
            .flatten()
            .map(|conv| conv.stride)
            .product()
    }

    /// One-time construction transform: rewrites stride-2 convolutions in the
    /// late stages to stride 1 with compensating dilation, preserving output
    /// resolution while keeping receptive-field growth.
    ///
    /// `Eight` rewrites the last two stages (dilate 2, then 4); `Sixteen`
    /// rewrites only the last stage (dilate 2).
    pub fn dilated(mut self, scale: DilateScale) -> Self {
        let n = self.stages.len();
        match scale {
            DilateScale::Eight => {
                if n >= 2 {
                    rewrite_stage(&mut self.stages[n - 2], 2);
                }
                if n >= 1 {
                    rewrite_stage(&mut self.stages[n - 1], 4);
                }
            }
            DilateScale::Sixteen => {
                if n >= 1 {
                    rewrite_stage(&mut self.stages[n - 1], 2);
                }
            }
        }
        self
    }
}

fn rewrite_stage(stage: &mut [ConvSpec], dilate: usize) {
    for conv in stage {
        if conv.stride == 2 {
            conv.stride = 1;
            if conv.kernel == 3 {
                conv.dilation = dilate / 2;
                conv.padding = dilate / 2;
            }
        } else if conv.kernel == 3 {
            conv.dilation = dilate;
            conv.padding = dilate;
        }
    }
}

/// Candle convolution stack built from a `TrunkSpec`, standing in for the
/// pretrained trunk with the classifier head removed.
pub struct ConvTrunk {
    layers: Vec<Conv2d>,
    out_channels: usize,
    total_stride: usize,
}

impl ConvTrunk {
    pub fn load(spec: TrunkSpec, vb: VarBuilder) -> candle_core::Result<Self> {
        let out_channels = spec.out_channels();
        let total_stride = spec.total_stride();
        let mut layers = Vec::new();
        for (i, stage) in spec.stages.iter().enumerate() {
            for (j, conv) in stage.iter().enumerate() {
                let cfg = Conv2dConfig {
                    stride: conv.stride,
                    padding: conv.padding,
                    dilation: conv.dilation,
                    ..Default::default()
                };
                layers.push(candle_nn::conv2d(
                    conv.in_channels,
                    conv.out_channels,
                    conv.kernel,
                    cfg,
                    vb.pp(format!("stages.{i}.{j}")),
                )?);
            }
        }
        Ok(Self {
            layers,
            out_channels,
            total_stride,
        })
    }
}

impl ImageBackbone for ConvTrunk {
    fn forward_features(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut h = xs.clone();
        for layer in &self.layers {
            h = layer.forward(&h)?.relu()?;
        }
        Ok(h)
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn total_stride(&self) -> usize {
        self.total_stride
    }
}
