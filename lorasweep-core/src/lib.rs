pub mod cmdargs;
pub mod error;
pub mod job;
pub mod prompt;
pub mod runner;
pub mod sampler;
pub mod sweep;
pub mod template;
mod webui;

pub use cmdargs::{cmdargs, ArgValue, JobArgs};
pub use error::{Result, SweepError};
pub use job::{Job, JobBuilder, SeedPolicy, SweepSettings};
pub use prompt::{AssembledPrompt, JoinPolicy, PromptAssembler};
pub use runner::{run_sweep, AggregateResult, Progress};
pub use sampler::Sampler;
pub use sweep::{LoraTag, WeightSweep, MAX_SWEEP_JOBS, MIN_STEP};
pub use template::Templates;
pub use webui::WebUiPipeline;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Seed value the web UI treats as "pick one at random".
pub const UNSET_SEED: i64 = -1;

/// A txt2img request in the shape the web UI API accepts.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub styles: Vec<String>,
    pub seed: i64,
    pub subseed: i64,
    pub subseed_strength: f64,
    pub seed_resize_from_h: i64,
    pub seed_resize_from_w: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler_name: Option<Sampler>,
    pub batch_size: u32,
    pub n_iter: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub width: u32,
    pub height: u32,
    pub restore_faces: bool,
    pub tiling: bool,
    pub do_not_save_samples: bool,
    pub do_not_save_grid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outpath_samples: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outpath_grids: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_for_display: Option<String>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            styles: Vec::new(),
            seed: UNSET_SEED,
            subseed: UNSET_SEED,
            subseed_strength: 0.0,
            seed_resize_from_h: -1,
            seed_resize_from_w: -1,
            sampler_name: None,
            batch_size: 1,
            n_iter: 1,
            steps: 20,
            cfg_scale: 7.0,
            width: 512,
            height: 512,
            restore_faces: false,
            tiling: false,
            do_not_save_samples: false,
            do_not_save_grid: false,
            outpath_samples: None,
            outpath_grids: None,
            prompt_for_display: None,
        }
    }
}

/// What the pipeline hands back for a single request.
#[derive(Debug, Clone, Default)]
pub struct Processed {
    pub images: Vec<DynamicImage>,
    pub all_prompts: Vec<String>,
    pub infotexts: Vec<String>,
}

/// The external image-generation service. Calls block until the result is
/// complete.
pub trait Pipeline: Send + Sync {
    fn process(&self, request: &GenerationRequest) -> anyhow::Result<Processed>;
}
