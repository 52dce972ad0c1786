use serde::{Deserialize, Serialize};

/// Samplers known to the web UI, serialized under their display names.
///
/// Every variant also accepts its lowercased display name and the legacy
/// `k_*` identifiers, which is what [`Sampler::lookup`] relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sampler {
    #[serde(rename = "DPM++ 2M", alias = "dpm++ 2m", alias = "k_dpmpp_2m")]
    DpmPp2M,
    #[serde(rename = "DPM++ SDE", alias = "dpm++ sde", alias = "k_dpmpp_sde")]
    DpmPpSde,
    #[serde(rename = "DPM++ 2M SDE", alias = "dpm++ 2m sde", alias = "k_dpmpp_2m_sde")]
    DpmPp2MSde,
    #[serde(rename = "DPM++ 2S a", alias = "dpm++ 2s a", alias = "k_dpmpp_2s_a")]
    DpmPp2SA,
    #[serde(rename = "Euler a", alias = "euler a", alias = "k_euler_a", alias = "k_euler_ancestral")]
    EulerA,
    #[serde(rename = "Euler", alias = "euler", alias = "k_euler")]
    Euler,
    #[serde(rename = "LMS", alias = "lms", alias = "k_lms")]
    Lms,
    #[serde(rename = "Heun", alias = "heun", alias = "k_heun")]
    Heun,
    #[serde(rename = "DPM2", alias = "dpm2", alias = "k_dpm_2")]
    Dpm2,
    #[serde(rename = "DPM2 a", alias = "dpm2 a", alias = "k_dpm_2_a")]
    Dpm2A,
    #[serde(rename = "DPM fast", alias = "dpm fast", alias = "k_dpm_fast")]
    DpmFast,
    #[serde(rename = "DPM adaptive", alias = "dpm adaptive", alias = "k_dpm_ad")]
    DpmAdaptive,
    #[serde(rename = "DDIM", alias = "ddim")]
    Ddim,
    #[serde(rename = "PLMS", alias = "plms")]
    Plms,
    #[serde(rename = "UniPC", alias = "unipc")]
    UniPc,
}

serde_plain::derive_display_from_serialize!(Sampler);
serde_plain::derive_fromstr_from_deserialize!(Sampler);

impl Sampler {
    /// Samplers in the order of the web UI's legacy numeric `sampler_index`.
    pub const BY_INDEX: [Sampler; 15] = [
        Sampler::EulerA,
        Sampler::Euler,
        Sampler::Lms,
        Sampler::Heun,
        Sampler::Dpm2,
        Sampler::Dpm2A,
        Sampler::DpmPp2SA,
        Sampler::DpmPp2M,
        Sampler::DpmPpSde,
        Sampler::DpmPp2MSde,
        Sampler::DpmFast,
        Sampler::DpmAdaptive,
        Sampler::Ddim,
        Sampler::Plms,
        Sampler::UniPc,
    ];

    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::BY_INDEX.get(i).copied())
    }

    /// Case-insensitive lookup by display name or alias.
    pub fn lookup(name: &str) -> Option<Self> {
        name.trim().to_lowercase().parse().ok()
    }
}
