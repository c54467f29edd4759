//! Per-category prompt and try-on configuration.
//!
//! Each demographic gets its own [`GarmentGenerator`]; adding a category means
//! adding a [`Category`] variant and a generator, then registering it in
//! [`generator_for`].

use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::str::FromStr;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TeenBoy,
    Infant,
}

impl Category {
    /// Label printed on the catalog cover.
    pub fn collection_label(self) -> &'static str {
        match self {
            Category::TeenBoy => "TEEN BOYS COLLECTION",
            Category::Infant => "INFANTS COLLECTION",
        }
    }
}

/// Model-generation settings shared by every category.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    pub category: Category,
    pub age_range: (u8, u8),
    pub brand: String,
    pub style_keywords: Vec<&'static str>,
    pub resolution: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f32,
    pub preserve_logo: bool,
    pub garment_mask_dilate: u32,
}

pub trait GarmentGenerator: Send + Sync {
    fn config(&self) -> &GenerationConfig;

    fn model_prompt(&self) -> String;

    fn negative_prompt(&self) -> String;

    /// Try-on node configuration (method and its settings).
    fn vto_config(&self) -> Value;

    fn workflow_overrides(&self) -> Value {
        json!({})
    }

    /// Prompt for the `index`-th garment of a batch. Categories with pose
    /// variation rotate through them; the default ignores the index.
    fn model_prompt_for(&self, _index: usize) -> String {
        self.model_prompt()
    }

    fn category(&self) -> Category {
        self.config().category
    }

    /// Merge this generator's settings into a base workflow tree.
    fn build_workflow(&self, base: &Value, garment_name: &str, index: usize) -> Value {
        let config = self.config();
        let mut workflow = match base {
            Value::Object(_) => base.clone(),
            _ => json!({}),
        };
        workflow["config"] = json!({
            "type": "complete_pipeline",
            "garment_image": "garment",
            "garment_name": garment_name,
            "positive_prompt": self.model_prompt_for(index),
            "negative_prompt": self.negative_prompt(),
            "vto_config": self.vto_config(),
            "steps": config.num_inference_steps,
            "cfg_scale": config.guidance_scale,
            "resolution": config.resolution,
            "preserve_logo": config.preserve_logo,
            "category": config.category,
            "brand": config.brand,
            "overrides": self.workflow_overrides(),
        });
        workflow
    }
}

/// Resolve a category identifier. Unknown identifiers fall back to teen boy.
pub fn generator_for(id: &str, brand: &str, resolution: u32) -> Box<dyn GarmentGenerator> {
    let category = Category::from_str(id).unwrap_or_else(|_| {
        tracing::warn!(category = %id, "Unknown category, defaulting to teen_boy");
        Category::TeenBoy
    });

    match category {
        Category::TeenBoy => Box::new(TeenBoyGenerator::new(brand, resolution)),
        Category::Infant => Box::new(InfantGenerator::new(brand, resolution)),
    }
}

/// Base workflow tree read from `path`. A missing or unparsable file yields
/// an empty object so generator settings alone drive the job.
pub fn load_base_workflow(path: &Path) -> Value {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No workflow file, using empty base");
            return json!({});
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(workflow) => workflow,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Workflow file is not valid JSON, using empty base");
            json!({})
        }
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Teen boys (13-15) ───────────────────────────────────────────────

const TEEN_BOY_PROMPT: &str = "
    photorealistic fashion photography of a teenage boy, age 14-15 years old,
    fair skin north Indian ethnicity, handsome youthful face, bright eyes,
    confident natural expression with subtle smile,
    athletic slim build, standing in a cool relaxed pose,
    professional studio lighting, soft diffused key light,
    clean neutral grey studio background,
    fashion catalog style, editorial quality,
    wearing a stylish casual t-shirt,
    sharp focus on face and clothing details,
    high fashion magazine aesthetic,
    8k resolution, hyperrealistic, professional photography";

const TEEN_BOY_NEGATIVE: &str = "
    deformed, distorted, disfigured, poorly drawn, bad anatomy,
    wrong anatomy, extra limbs, missing limbs, floating limbs,
    disconnected limbs, mutation, mutated, ugly, disgusting,
    blurry, low quality, low resolution, pixelated,
    watermark, text, logo, signature, jpeg artifacts,
    poorly drawn hands, poorly drawn feet, poorly drawn face,
    out of frame, extra fingers, mutated hands,
    deformed body, deformed face, deformed fingers,
    bad proportions, gross proportions,
    cartoon, anime, 3d render, illustration, painting";

const POSE_VARIATIONS: [&str; 5] = [
    "standing straight with hands in pockets, relaxed confident pose",
    "slight side angle, one hand adjusting collar, casual cool vibe",
    "arms crossed, looking at camera with friendly smile",
    "hands at sides, walking pose, dynamic movement",
    "leaning slightly, hands behind back, editorial pose",
];

pub struct TeenBoyGenerator {
    config: GenerationConfig,
}

impl TeenBoyGenerator {
    pub fn new(brand: &str, resolution: u32) -> Self {
        Self {
            config: GenerationConfig {
                category: Category::TeenBoy,
                age_range: (13, 15),
                brand: brand.to_string(),
                style_keywords: vec!["streetwear", "casual", "cool", "gen-z", "energetic"],
                resolution,
                num_inference_steps: 35,
                guidance_scale: 7.0,
                preserve_logo: true,
                garment_mask_dilate: 5,
            },
        }
    }
}

impl GarmentGenerator for TeenBoyGenerator {
    fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn model_prompt(&self) -> String {
        one_line(TEEN_BOY_PROMPT)
    }

    fn negative_prompt(&self) -> String {
        one_line(TEEN_BOY_NEGATIVE)
    }

    fn model_prompt_for(&self, index: usize) -> String {
        let pose = POSE_VARIATIONS[index % POSE_VARIATIONS.len()];
        format!("{}, {}", self.model_prompt(), pose)
    }

    /// IDM-VTON tuned to keep prints and logos legible.
    fn vto_config(&self) -> Value {
        json!({
            "method": "idm_vton",
            "model_type": "teen_male",
            "settings": {
                "preserve_text": true,
                "text_preservation_strength": 0.85,
                "garment_mask_dilate": self.config.garment_mask_dilate,
                "garment_mask_blur": 3,
                "denoise_strength": 0.75,
                "guidance_scale": 7.0,
                "num_inference_steps": 30,
                "body_type": "athletic_slim",
                "fit_style": "regular"
            }
        })
    }

    fn workflow_overrides(&self) -> Value {
        json!({
            "face_detailer": {
                "detail_method": "enhanced",
                "sharpness": 0.8,
                "eye_enhancement": true,
                "skin_smoothing": 0.3
            },
            "upscaler": {
                "method": "ultimate_sd_upscale",
                "scale_factor": 4,
                "tile_size": 512,
                "tile_overlap": 64,
                "denoise_strength": 0.2
            },
            "post_processing": {
                "contrast": 1.05,
                "brightness": 1.02,
                "saturation": 1.0,
                "sharpening": 0.1
            }
        })
    }
}

// ── Infants (0-3) ───────────────────────────────────────────────────

const INFANT_PROMPT: &str = "
    professional product photography of a cute baby, 1-2 years old,
    Indian ethnicity, happy adorable expression, chubby cheeks,
    sitting pose, clean white studio background,
    soft natural lighting, family photography style,
    wearing cute infant clothing,
    sharp focus, high resolution, professional baby photography";

const INFANT_NEGATIVE: &str = "
    deformed, distorted, bad anatomy, scary, creepy,
    blurry, low quality, watermark, text,
    unnatural skin, bad proportions";

/// Infants use inpainting; standard try-on handles their proportions poorly.
pub struct InfantGenerator {
    config: GenerationConfig,
}

impl InfantGenerator {
    pub fn new(brand: &str, resolution: u32) -> Self {
        Self {
            config: GenerationConfig {
                category: Category::Infant,
                age_range: (0, 3),
                brand: brand.to_string(),
                style_keywords: vec!["cute", "adorable", "comfortable"],
                resolution,
                num_inference_steps: 30,
                guidance_scale: 7.5,
                preserve_logo: true,
                garment_mask_dilate: 5,
            },
        }
    }
}

impl GarmentGenerator for InfantGenerator {
    fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn model_prompt(&self) -> String {
        one_line(INFANT_PROMPT)
    }

    fn negative_prompt(&self) -> String {
        one_line(INFANT_NEGATIVE)
    }

    fn vto_config(&self) -> Value {
        json!({
            "method": "inpainting",
            "model_type": "infant",
            "settings": {
                "inpaint_mode": "clothing_replacement",
                "mask_expansion": 10,
                "mask_blur": 5,
                "denoise_strength": 0.85,
                "guidance_scale": 7.5,
                "num_inference_steps": 30,
                "preserve_subject": true
            }
        })
    }

    fn workflow_overrides(&self) -> Value {
        json!({
            "face_detailer": {
                "detail_method": "soft",
                "sharpness": 0.5,
                "skin_smoothing": 0.5
            },
            "upscaler": {
                "method": "ultimate_sd_upscale",
                "scale_factor": 4,
                "denoise_strength": 0.15
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_known_categories() {
        assert_eq!(generator_for("teen_boy", "bono", 4096).category(), Category::TeenBoy);
        assert_eq!(generator_for("infant", "bono", 4096).category(), Category::Infant);
    }

    #[test]
    fn test_registry_defaults_unknown_category() {
        let generator = generator_for("teen_girl", "bono", 4096);
        assert_eq!(generator.category(), Category::TeenBoy);
    }

    #[test]
    fn test_vto_method_differs_by_category() {
        let teen = generator_for("teen_boy", "bono", 4096);
        let infant = generator_for("infant", "bono", 4096);
        assert_eq!(teen.vto_config()["method"], "idm_vton");
        assert_eq!(infant.vto_config()["method"], "inpainting");
    }

    #[test]
    fn test_pose_rotation() {
        let teen = TeenBoyGenerator::new("bono", 4096);
        assert!(teen.model_prompt_for(0).ends_with(POSE_VARIATIONS[0]));
        assert!(teen.model_prompt_for(6).ends_with(POSE_VARIATIONS[1]));
        let infant = InfantGenerator::new("bono", 4096);
        assert_eq!(infant.model_prompt_for(3), infant.model_prompt());
    }

    #[test]
    fn test_prompts_are_single_line() {
        let teen = TeenBoyGenerator::new("bono", 4096);
        assert!(!teen.model_prompt().contains('\n'));
        assert!(teen.model_prompt().starts_with("photorealistic fashion photography"));
    }

    #[test]
    fn test_build_workflow_keeps_base_nodes() {
        let base = json!({"3": {"class_type": "KSampler"}});
        let teen = TeenBoyGenerator::new("bono", 2048);
        let workflow = teen.build_workflow(&base, "graphic_tee", 2);
        assert_eq!(workflow["3"]["class_type"], "KSampler");
        assert_eq!(workflow["config"]["garment_name"], "graphic_tee");
        assert_eq!(workflow["config"]["resolution"], 2048);
        assert_eq!(workflow["config"]["category"], "teen_boy");
        assert_eq!(workflow["config"]["overrides"]["upscaler"]["scale_factor"], 4);
    }

    #[test]
    fn test_load_base_workflow() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_base_workflow(&dir.path().join("missing.json")), json!({}));

        let path = dir.path().join("workflow_api.json");
        std::fs::write(&path, r#"{"4": {"class_type": "CheckpointLoaderSimple"}}"#).unwrap();
        assert_eq!(load_base_workflow(&path)["4"]["class_type"], "CheckpointLoaderSimple");

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(load_base_workflow(&path), json!({}));
    }

    #[test]
    fn test_collection_labels() {
        assert_eq!(Category::TeenBoy.collection_label(), "TEEN BOYS COLLECTION");
        assert_eq!(Category::Infant.to_string(), "infant");
    }
}
