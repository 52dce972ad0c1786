use image::DynamicImage;
use tracing::info;

use crate::{Job, Pipeline, Processed, Result, SweepError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

/// Outputs of every job of a sweep, concatenated in job order.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    pub images: Vec<DynamicImage>,
    pub all_prompts: Vec<String>,
    pub infotexts: Vec<String>,
    /// Seed each job was submitted with.
    pub seeds: Vec<i64>,
}

impl AggregateResult {
    fn push(&mut self, seed: i64, processed: Processed) {
        self.images.extend(processed.images);
        self.all_prompts.extend(processed.all_prompts);
        self.infotexts.extend(processed.infotexts);
        self.seeds.push(seed);
    }
}

/// Submits `jobs` to the pipeline one at a time, in order, and stops at the
/// first failure.
pub fn run_sweep<P, F>(pipeline: &P, jobs: &[Job], mut on_progress: F) -> Result<AggregateResult>
where
    P: Pipeline + ?Sized,
    F: FnMut(Progress),
{
    let total = jobs.len();
    let mut result = AggregateResult::default();

    for (position, job) in jobs.iter().enumerate() {
        info!(job = job.index, total, "Prompt: {}", job.request.prompt);
        info!(job = job.index, total, "Negative Prompt: {}", job.request.negative_prompt);

        let processed = pipeline
            .process(&job.request)
            .map_err(|e| SweepError::Pipeline {
                index: job.index,
                source: e.into(),
            })?;
        result.push(job.request.seed, processed);

        on_progress(Progress {
            done: position + 1,
            total,
        });
    }

    Ok(result)
}
