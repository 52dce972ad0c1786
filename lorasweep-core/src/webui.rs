use std::time::Duration;

use anyhow::{Context, Result};
use base64::{prelude::BASE64_STANDARD, Engine};
use image::DynamicImage;
use serde::Deserialize;
use tracing::debug;

use crate::{GenerationRequest, Pipeline, Processed};

const TXT2IMG_PATH: &str = "/sdapi/v1/txt2img";

/// [`Pipeline`] backed by a running Stable-Diffusion web UI with its API
/// enabled.
pub struct WebUiPipeline {
    agent: ureq::Agent,
    endpoint: String,
}

impl WebUiPipeline {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), TXT2IMG_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Pipeline for WebUiPipeline {
    fn process(&self, request: &GenerationRequest) -> Result<Processed> {
        debug!(endpoint = %self.endpoint, seed = request.seed, "submitting txt2img request");

        let response = match self.agent.post(&self.endpoint).send_json(request) {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                anyhow::bail!("web UI returned HTTP {status}: {body}");
            }
            Err(e) => return Err(e).context("failed to reach the web UI"),
        };

        let body: Txt2ImgResponse = response
            .into_json()
            .context("failed to parse txt2img response")?;
        body.into_processed()
    }
}

#[derive(Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
    // JSON document serialized into a string
    #[serde(default)]
    info: String,
}

#[derive(Deserialize, Default)]
struct GenerationInfo {
    #[serde(default)]
    all_prompts: Vec<String>,
    #[serde(default)]
    infotexts: Vec<String>,
}

impl Txt2ImgResponse {
    fn into_processed(self) -> Result<Processed> {
        let images = self
            .images
            .iter()
            .enumerate()
            .map(|(i, encoded)| {
                decode_image(encoded).with_context(|| format!("failed to decode image {i}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let info = if self.info.is_empty() {
            GenerationInfo::default()
        } else {
            serde_json::from_str(&self.info).context("failed to parse generation info")?
        };

        Ok(Processed {
            images,
            all_prompts: info.all_prompts,
            infotexts: info.infotexts,
        })
    }
}

fn decode_image(encoded: &str) -> Result<DynamicImage> {
    let data = match encoded.split_once(',') {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let bytes = BASE64_STANDARD.decode(data)?;
    Ok(image::load_from_memory(&bytes)?)
}
