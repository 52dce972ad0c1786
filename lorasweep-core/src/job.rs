use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    GenerationRequest, JoinPolicy, LoraTag, PromptAssembler, Result, Templates, WeightSweep,
    UNSET_SEED,
};

/// Random seeds are drawn from `0..SEED_UPPER_BOUND`.
pub const SEED_UPPER_BOUND: i64 = 4_294_967_294;

/// When a sweep with `random_seed` set actually replaces the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    #[default]
    Always,
    /// Only when the base request leaves the seed unset (`-1`); a seed the
    /// user picked is kept.
    OnlyWhenUnset,
}

/// Everything a sweep needs besides the base request and the templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    pub lora: String,
    #[serde(flatten)]
    pub sweep: WeightSweep,
    #[serde(default)]
    pub random_seed: bool,
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    #[serde(default)]
    pub extra_prompt: Option<String>,
    #[serde(default)]
    pub join_policy: JoinPolicy,
}

impl SweepSettings {
    pub fn new(lora: impl Into<String>, sweep: WeightSweep) -> Self {
        Self {
            lora: lora.into(),
            sweep,
            random_seed: false,
            seed_policy: SeedPolicy::default(),
            extra_prompt: None,
            join_policy: JoinPolicy::default(),
        }
    }
}

/// One sweep point, ready for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub index: usize,
    pub tag: LoraTag,
    pub request: GenerationRequest,
}

pub struct JobBuilder<'a> {
    base: &'a GenerationRequest,
    settings: &'a SweepSettings,
    templates: &'a Templates,
}

impl<'a> JobBuilder<'a> {
    pub fn new(
        base: &'a GenerationRequest,
        settings: &'a SweepSettings,
        templates: &'a Templates,
    ) -> Self {
        Self {
            base,
            settings,
            templates,
        }
    }

    pub fn build(&self) -> Result<Vec<Job>> {
        self.build_with_rng(&mut rand::thread_rng())
    }

    /// Builds one job per sweep weight, in ascending weight order. Each
    /// request is the base request with prompt, negative prompt and seed
    /// replaced; the base itself is left untouched.
    pub fn build_with_rng<R: Rng>(&self, rng: &mut R) -> Result<Vec<Job>> {
        let settings = self.settings;
        settings.sweep.validate()?;

        let assembler = PromptAssembler::new(settings.join_policy);
        let prompt = assembler.assemble(
            &self.base.prompt,
            settings.extra_prompt.as_deref(),
            &self.templates.prompt,
        );
        let negative_prompt = assembler
            .assemble(&self.base.negative_prompt, None, &self.templates.negative_prompt)
            .text();
        let randomize = self.randomizes_seed();

        let jobs: Vec<Job> = settings
            .sweep
            .tags(&settings.lora)
            .into_iter()
            .enumerate()
            .map(|(index, tag)| {
                let seed = if randomize {
                    rng.gen_range(0..SEED_UPPER_BOUND)
                } else {
                    self.base.seed
                };
                Job {
                    index,
                    request: GenerationRequest {
                        prompt: prompt.with_tag(&tag),
                        negative_prompt: negative_prompt.clone(),
                        seed,
                        ..self.base.clone()
                    },
                    tag,
                }
            })
            .collect();

        if jobs.is_empty() {
            warn!(sweep = ?settings.sweep, "sweep range is empty, no jobs built");
        }
        debug!(lora = %settings.lora, jobs = jobs.len(), randomize, "built sweep jobs");
        Ok(jobs)
    }

    fn randomizes_seed(&self) -> bool {
        self.settings.random_seed
            && match self.settings.seed_policy {
                SeedPolicy::Always => true,
                SeedPolicy::OnlyWhenUnset => self.base.seed == UNSET_SEED,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SweepError;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn base() -> GenerationRequest {
        GenerationRequest {
            prompt: "portrait".into(),
            negative_prompt: "lowres".into(),
            seed: 1234,
            steps: 30,
            ..GenerationRequest::default()
        }
    }

    fn templates() -> Templates {
        Templates {
            prompt: "masterpiece".into(),
            negative_prompt: "blurry, watermark".into(),
        }
    }

    fn build(base: &GenerationRequest, settings: &SweepSettings) -> Vec<Job> {
        JobBuilder::new(base, settings, &templates())
            .build_with_rng(&mut StdRng::seed_from_u64(7))
            .unwrap()
    }

    #[test]
    fn one_job_per_weight_in_sweep_order() {
        let settings = SweepSettings::new("styleA", WeightSweep::new(-0.1, 0.2, 0.1));
        let jobs = build(&base(), &settings);

        let prompts: Vec<&str> = jobs.iter().map(|job| job.request.prompt.as_str()).collect();
        assert_eq!(
            prompts,
            vec![
                "portrait,<lora:styleA:-0.1>,masterpiece",
                "portrait,<lora:styleA:0.0>,masterpiece",
                "portrait,<lora:styleA:0.1>,masterpiece",
                "portrait,<lora:styleA:0.2>,masterpiece",
            ]
        );
        assert!(jobs.windows(2).all(|pair| pair[0].tag.weight < pair[1].tag.weight));
        assert_eq!(jobs.iter().map(|job| job.index).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn overrides_only_prompt_fields_and_seed() {
        let base = base();
        let settings = SweepSettings::new("styleA", WeightSweep::new(0.5, 0.5, 0.1));
        let jobs = build(&base, &settings);

        assert_eq!(jobs.len(), 1);
        let request = &jobs[0].request;
        assert_eq!(request.negative_prompt, "lowres,blurry, watermark");
        assert_eq!(request.steps, base.steps);
        assert_eq!(request.seed, base.seed);
        assert_eq!(base.prompt, "portrait");
    }

    #[test]
    fn seed_kept_without_random_seed() {
        let settings = SweepSettings::new("styleA", WeightSweep::default());
        let jobs = build(&base(), &settings);
        assert_eq!(jobs.len(), settings.sweep.len());
        assert!(jobs.iter().all(|job| job.request.seed == 1234));
    }

    #[test]
    fn random_seed_draws_in_range_and_varies() {
        let settings = SweepSettings {
            random_seed: true,
            ..SweepSettings::new("styleA", WeightSweep::default())
        };
        let jobs = build(&base(), &settings);

        assert!(jobs
            .iter()
            .all(|job| (0..SEED_UPPER_BOUND).contains(&job.request.seed)));
        assert!(jobs.iter().any(|job| job.request.seed != jobs[0].request.seed));
    }

    #[test]
    fn only_when_unset_keeps_explicit_seed() {
        let settings = SweepSettings {
            random_seed: true,
            seed_policy: SeedPolicy::OnlyWhenUnset,
            ..SweepSettings::new("styleA", WeightSweep::new(0.0, 0.3, 0.1))
        };
        let jobs = build(&base(), &settings);
        assert!(jobs.iter().all(|job| job.request.seed == 1234));

        let unset = GenerationRequest {
            seed: UNSET_SEED,
            ..base()
        };
        let jobs = build(&unset, &settings);
        assert!(jobs.iter().all(|job| job.request.seed >= 0));
    }

    #[test]
    fn extra_prompt_goes_before_tag() {
        let settings = SweepSettings {
            extra_prompt: Some("red hair".into()),
            ..SweepSettings::new("styleA", WeightSweep::new(1.0, 1.0, 0.1))
        };
        let jobs = build(&base(), &settings);
        assert_eq!(jobs[0].request.prompt, "portrait,red hair,<lora:styleA:1.0>,masterpiece");
    }

    #[test]
    fn empty_range_builds_nothing() {
        let settings = SweepSettings::new("styleA", WeightSweep::new(1.0, 0.0, 0.1));
        assert!(build(&base(), &settings).is_empty());
    }

    #[test]
    fn zero_step_is_rejected() {
        let settings = SweepSettings::new("styleA", WeightSweep::new(0.0, 1.0, 0.0));
        let result = JobBuilder::new(&base(), &settings, &templates()).build();
        assert!(matches!(result, Err(SweepError::InvalidSweepRange { .. })));
    }
}
