//! Parser for job-definition lines such as
//! `--steps 20 --cfg_scale 7.5 --prompt a cat sitting`.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::{GenerationRequest, Result, Sampler, SweepError};

/// A coerced flag value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// `None` when the name did not match any known sampler.
    Sampler(Option<Sampler>),
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Str,
    Int,
    Float,
    Bool,
    Sampler,
}

fn kind_of(flag: &str) -> Option<Kind> {
    let kind = match flag {
        "outpath_samples" | "outpath_grids" | "prompt_for_display" | "prompt"
        | "negative_prompt" | "styles" => Kind::Str,
        "seed" | "subseed" | "seed_resize_from_h" | "seed_resize_from_w" | "sampler_index"
        | "batch_size" | "n_iter" | "steps" | "width" | "height" => Kind::Int,
        "subseed_strength" | "cfg_scale" => Kind::Float,
        "restore_faces" | "tiling" | "do_not_save_samples" | "do_not_save_grid" => Kind::Bool,
        "sampler_name" => Kind::Sampler,
        _ => return None,
    };
    Some(kind)
}

// These consume every following token up to the next `--flag`.
fn is_variadic(flag: &str) -> bool {
    matches!(flag, "prompt" | "negative_prompt")
}

fn coerce(flag: &str, kind: Kind, raw: &str) -> Result<ArgValue> {
    let invalid = || SweepError::InvalidValue {
        flag: flag.to_string(),
        value: raw.to_string(),
    };
    let value = match kind {
        Kind::Str => ArgValue::Str(raw.to_string()),
        Kind::Int => ArgValue::Int(raw.trim().parse().map_err(|_| invalid())?),
        Kind::Float => ArgValue::Float(raw.trim().parse().map_err(|_| invalid())?),
        Kind::Bool => ArgValue::Bool(raw == "true"),
        Kind::Sampler => {
            let sampler = Sampler::lookup(raw);
            if sampler.is_none() {
                warn!(value = raw, "unknown sampler name, leaving sampler unset");
            }
            ArgValue::Sampler(sampler)
        }
    };
    Ok(value)
}

/// Splits `line` shell-style and parses the `--flag value` pairs.
pub fn cmdargs(line: &str) -> Result<JobArgs> {
    let tokens = shlex::split(line).ok_or_else(|| {
        SweepError::MalformedArgument(format!("unbalanced quoting in {line:?}"))
    })?;

    let mut args = BTreeMap::new();
    let mut pos = 0;
    while pos < tokens.len() {
        let token = &tokens[pos];
        let flag = token.strip_prefix("--").ok_or_else(|| {
            SweepError::MalformedArgument(format!("must start with \"--\": {token}"))
        })?;
        if pos + 1 >= tokens.len() {
            return Err(SweepError::MalformedArgument(format!(
                "missing argument for command line option {token}"
            )));
        }

        let kind = kind_of(flag).ok_or_else(|| SweepError::UnknownOption(flag.to_string()))?;
        if is_variadic(flag) {
            pos += 1;
            let start = pos;
            pos += 1;
            while pos < tokens.len() && !tokens[pos].starts_with("--") {
                pos += 1;
            }
            args.insert(flag.to_string(), coerce(flag, kind, &tokens[start..pos].join(" "))?);
            continue;
        }

        args.insert(flag.to_string(), coerce(flag, kind, &tokens[pos + 1])?);
        pos += 2;
    }

    Ok(JobArgs(args))
}

/// Flag values parsed from one job-definition line, keyed by flag name.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct JobArgs(BTreeMap<String, ArgValue>);

impl JobArgs {
    pub fn get(&self, flag: &str) -> Option<&ArgValue> {
        self.0.get(flag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(flag, value)| (flag.as_str(), value))
    }

    /// Returns `base` with every parsed flag applied on top.
    pub fn apply(&self, base: &GenerationRequest) -> Result<GenerationRequest> {
        let mut request = base.clone();
        for (flag, value) in self.iter() {
            match (flag, value) {
                ("prompt", ArgValue::Str(s)) => request.prompt = s.clone(),
                ("negative_prompt", ArgValue::Str(s)) => request.negative_prompt = s.clone(),
                ("styles", ArgValue::Str(s)) => {
                    request.styles = s
                        .split(',')
                        .map(str::trim)
                        .filter(|style| !style.is_empty())
                        .map(String::from)
                        .collect()
                }
                ("outpath_samples", ArgValue::Str(s)) => request.outpath_samples = Some(s.clone()),
                ("outpath_grids", ArgValue::Str(s)) => request.outpath_grids = Some(s.clone()),
                ("prompt_for_display", ArgValue::Str(s)) => {
                    request.prompt_for_display = Some(s.clone())
                }
                ("seed", ArgValue::Int(v)) => request.seed = *v,
                ("subseed", ArgValue::Int(v)) => request.subseed = *v,
                ("seed_resize_from_h", ArgValue::Int(v)) => request.seed_resize_from_h = *v,
                ("seed_resize_from_w", ArgValue::Int(v)) => request.seed_resize_from_w = *v,
                // sampler_name sorts after sampler_index, so it wins when both are given
                ("sampler_index", ArgValue::Int(v)) => {
                    request.sampler_name = Some(Sampler::from_index(*v).ok_or_else(|| {
                        SweepError::InvalidValue {
                            flag: flag.to_string(),
                            value: v.to_string(),
                        }
                    })?)
                }
                ("batch_size", ArgValue::Int(v)) => request.batch_size = to_u32(flag, *v)?,
                ("n_iter", ArgValue::Int(v)) => request.n_iter = to_u32(flag, *v)?,
                ("steps", ArgValue::Int(v)) => request.steps = to_u32(flag, *v)?,
                ("width", ArgValue::Int(v)) => request.width = to_u32(flag, *v)?,
                ("height", ArgValue::Int(v)) => request.height = to_u32(flag, *v)?,
                ("subseed_strength", ArgValue::Float(v)) => request.subseed_strength = *v,
                ("cfg_scale", ArgValue::Float(v)) => request.cfg_scale = *v,
                ("restore_faces", ArgValue::Bool(v)) => request.restore_faces = *v,
                ("tiling", ArgValue::Bool(v)) => request.tiling = *v,
                ("do_not_save_samples", ArgValue::Bool(v)) => request.do_not_save_samples = *v,
                ("do_not_save_grid", ArgValue::Bool(v)) => request.do_not_save_grid = *v,
                ("sampler_name", ArgValue::Sampler(sampler)) => request.sampler_name = *sampler,
                _ => {
                    return Err(SweepError::InvalidValue {
                        flag: flag.to_string(),
                        value: format!("{value:?}"),
                    })
                }
            }
        }
        Ok(request)
    }
}

fn to_u32(flag: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| SweepError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}
