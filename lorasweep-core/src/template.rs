use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Result, SweepError};

pub const PROMPT_FILE: &str = "prompt";
pub const NEGATIVE_PROMPT_FILE: &str = "negative_prompt";

/// Prompt fragments appended to every job of a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Templates {
    pub prompt: String,
    pub negative_prompt: String,
}

impl Templates {
    /// Reads the `prompt` and `negative_prompt` files from `dir`. Both must
    /// exist; their contents are trimmed.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let templates = Self {
            prompt: read_template(dir.join(PROMPT_FILE))?,
            negative_prompt: read_template(dir.join(NEGATIVE_PROMPT_FILE))?,
        };
        debug!(dir = %dir.display(), "loaded prompt templates");
        Ok(templates)
    }
}

fn read_template(path: PathBuf) -> Result<String> {
    match fs::read_to_string(&path) {
        Ok(content) => Ok(content.trim().to_string()),
        Err(source) => Err(SweepError::TemplateFileMissing { path, source }),
    }
}
