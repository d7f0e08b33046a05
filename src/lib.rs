pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod types;
pub mod viz;

pub use config::{
    BackboneConfig, Enhancement, IndexerConfig, PatchNetConfig, VisualizerConfig,
    MIN_CLIP_SECONDS,
};
pub use error::PipelineError;
pub use index::{build_index, validate_index};
pub use model::trunk::{ConvSpec, ConvTrunk, DilateScale, TrunkSpec};
pub use model::{
    build_frame_net, build_patch_net, select_device, var_builder_from_safetensors, FrameNet,
    GlobalPoolNet, ImageBackbone, PatchBackbone, PatchEmbed, PatchNet, PoolKind,
};
pub use types::{IndexRecord, IndexSummary, RowDiagnostic, RowStatus, VideoManifest};
pub use viz::render_sound_clusters;
