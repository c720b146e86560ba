//! Saved prompt record handed to the create page

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::SourceProcessing;

pub const DEFAULT_SAMPLER: &str = "k_heun";
/// Replaces samplers the backend would reject
pub const FALLBACK_SAMPLER: &str = "k_euler_a";

/// Local whitelist of sampler names. The generation backend keeps its own
/// list; this one only guards saved prompts against obviously bad values.
const SAMPLERS: &[&str] = &[
    "k_lms",
    "k_heun",
    "k_euler",
    "k_euler_a",
    "k_dpm_2",
    "k_dpm_2_a",
    "k_dpm_fast",
    "k_dpm_adaptive",
    "k_dpmpp_2s_a",
    "k_dpmpp_2m",
    "dpmsolver",
];

/// Whitelisted samplers treated as text-to-image only
const TXT2IMG_ONLY_SAMPLERS: &[&str] = &["dpmsolver"];

pub fn valid_sampler(sampler: &str, img2img: bool) -> bool {
    if !SAMPLERS.contains(&sampler) {
        return false;
    }
    !(img2img && TXT2IMG_ONLY_SAMPLERS.contains(&sampler))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptRecord {
    pub img2img: bool,
    pub image_type: String,
    pub copy_prompt: bool,
    pub prompt: String,
    pub sampler: String,
    #[serde(rename = "cfg_scale")]
    pub cfg_scale: f32,
    pub orientation: String,
    pub height: u32,
    pub width: u32,
    pub steps: u32,
    pub parent_job_id: String,
    pub negative: String,
    #[serde(rename = "source_image")]
    pub source_image: String,
    #[serde(rename = "source_mask")]
    pub source_mask: String,
    #[serde(rename = "source_processing")]
    pub source_processing: SourceProcessing,
    #[serde(rename = "denoising_strength")]
    pub denoising_strength: f32,
    pub models: Vec<String>,
}

impl Default for PromptRecord {
    fn default() -> Self {
        Self {
            img2img: false,
            image_type: String::new(),
            copy_prompt: false,
            prompt: String::new(),
            sampler: DEFAULT_SAMPLER.to_string(),
            cfg_scale: 9.0,
            orientation: String::new(),
            height: 512,
            width: 512,
            steps: 32,
            parent_job_id: String::new(),
            negative: String::new(),
            source_image: String::new(),
            source_mask: String::new(),
            source_processing: SourceProcessing::Prompt,
            denoising_strength: 0.75,
            models: vec!["stable_diffusion".to_string()],
        }
    }
}

/// Last saved prompt plus the cached prompt text kept across tab switches
#[derive(Debug, Default)]
pub struct PromptStore {
    saved: RwLock<PromptRecord>,
    cached_prompt: RwLock<String>,
}

impl PromptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save a prompt for the create page to pick up
    pub fn save_prompt(&self, mut record: PromptRecord) {
        let inpainting = record.source_processing == SourceProcessing::InPainting;
        if !valid_sampler(&record.sampler, record.img2img || inpainting) {
            tracing::debug!(
                "Sampler {} not valid here, using {}",
                record.sampler,
                FALLBACK_SAMPLER
            );
            record.sampler = FALLBACK_SAMPLER.to_string();
        }
        record.copy_prompt = true;
        *self.saved.write() = record;
    }

    pub fn load_edit_prompt(&self) -> PromptRecord {
        self.saved.read().clone()
    }

    pub fn clear_prompt(&self) {
        *self.saved.write() = PromptRecord::default();
    }

    pub fn update_cached_prompt(&self, text: &str) {
        *self.cached_prompt.write() = text.to_string();
    }

    pub fn cached_prompt(&self) -> String {
        self.cached_prompt.read().clone()
    }
}
