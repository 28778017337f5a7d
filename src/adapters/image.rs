//! Image adapters: generation, edits and variations.

use super::files::PNG_FILE_RULES;
use super::{check_file, invalid, str_field, EndpointAdapter, EndpointRequest, FileValidator};
use crate::endpoint::Endpoint;
use crate::types::{ImageConfig, ImageData, ResponseDto, ResponseType, UnifiedRequest};
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_GENERATION_MODEL: &str = "dall-e-3";
pub const DEFAULT_EDIT_MODEL: &str = "dall-e-2";
pub const DEFAULT_SIZE: &str = "1024x1024";
pub const MAX_PROMPT_CHARS: usize = 4000;

const QUALITIES: &[&str] = &["standard", "hd"];
const STYLES: &[&str] = &["vivid", "natural"];
const RESPONSE_FORMATS: &[&str] = &["url", "b64_json"];

/// Per-model limits. Models not listed here are passed through with only the generic checks.
#[derive(Debug, Clone, Copy)]
struct ModelLimits {
    sizes: &'static [&'static str],
    max_n: u32,
    quality_style: bool,
}

fn limits(model: &str) -> Option<ModelLimits> {
    match model {
        "dall-e-3" => Some(ModelLimits {
            sizes: &["1024x1024", "1792x1024", "1024x1792"],
            max_n: 1,
            quality_style: true,
        }),
        "dall-e-2" => Some(ModelLimits {
            sizes: &["256x256", "512x512", "1024x1024"],
            max_n: 10,
            quality_style: false,
        }),
        _ => None,
    }
}

fn image_of<'a>(request: &'a UnifiedRequest, source: &str) -> Result<&'a ImageConfig> {
    request
        .image
        .as_ref()
        .ok_or_else(|| invalid("image configuration is required", "image", source))
}

fn check_prompt<'a>(image: &'a ImageConfig, source: &str) -> Result<&'a str> {
    let prompt = image
        .prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| invalid("image.prompt is required", "image.prompt", source))?;
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(invalid(
            format!("prompt exceeds {} characters", MAX_PROMPT_CHARS),
            "image.prompt",
            source,
        ));
    }
    Ok(prompt)
}

/// Size, n and response_format shared by all three endpoints.
fn common_fields(
    out: &mut EndpointRequest,
    image: &ImageConfig,
    model: &str,
    source: &str,
) -> Result<()> {
    let limits = limits(model);
    let size = image.size.as_deref().unwrap_or(DEFAULT_SIZE);
    if let Some(l) = limits {
        if !l.sizes.contains(&size) {
            return Err(invalid(
                format!(
                    "size '{}' is not supported by {} (expected one of: {})",
                    size,
                    model,
                    l.sizes.join(", ")
                ),
                "image.size",
                source,
            ));
        }
    }

    let n = image.n.unwrap_or(1);
    let max_n = limits.map(|l| l.max_n).unwrap_or(10);
    if n < 1 || n > max_n {
        return Err(invalid(
            format!("n must be between 1 and {} for {}", max_n, model),
            "image.n",
            source,
        ));
    }

    let format = image.response_format.as_deref().unwrap_or("url");
    if !RESPONSE_FORMATS.contains(&format) {
        return Err(invalid(
            format!("unsupported response_format '{}'", format),
            "image.response_format",
            source,
        ));
    }

    out.set("model", model);
    out.set("size", size);
    out.set("n", n);
    out.set("response_format", format);
    out.set_opt("user", image.user.clone());
    Ok(())
}

fn image_response(response_type: ResponseType, raw: &Value) -> ResponseDto {
    let mut dto = ResponseDto::new(response_type, raw.clone());
    dto.images = raw.get("data").and_then(|d| d.as_array()).map(|items| {
        items
            .iter()
            .map(|item| ImageData {
                url: str_field(item, "url"),
                b64_json: str_field(item, "b64_json"),
                revised_prompt: str_field(item, "revised_prompt"),
            })
            .collect()
    });
    dto.copy_meta(raw, "created");
    dto.copy_meta(raw, "usage");
    dto
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageGenerationAdapter;

impl EndpointAdapter for ImageGenerationAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::ImageGeneration
    }

    fn transform_request(&self, request: &UnifiedRequest) -> Result<EndpointRequest> {
        let source = self.endpoint().as_str();
        let image = image_of(request, source)?;
        let prompt = check_prompt(image, source)?;
        let model = image.model.as_deref().unwrap_or(DEFAULT_GENERATION_MODEL);

        let mut out = EndpointRequest::new(self.endpoint());
        out.set("prompt", prompt);
        common_fields(&mut out, image, model, source)?;

        match limits(model).map(|l| l.quality_style) {
            Some(true) => {
                let quality = image.quality.as_deref().unwrap_or("standard");
                if !QUALITIES.contains(&quality) {
                    return Err(invalid(
                        format!("quality must be one of: {}", QUALITIES.join(", ")),
                        "image.quality",
                        source,
                    ));
                }
                let style = image.style.as_deref().unwrap_or("vivid");
                if !STYLES.contains(&style) {
                    return Err(invalid(
                        format!("style must be one of: {}", STYLES.join(", ")),
                        "image.style",
                        source,
                    ));
                }
                out.set("quality", quality);
                out.set("style", style);
            }
            Some(false) => {
                if image.quality.is_some() || image.style.is_some() {
                    debug!(model, "dropping quality/style unsupported by model");
                }
            }
            None => {
                out.set_opt("quality", image.quality.clone());
                out.set_opt("style", image.style.clone());
            }
        }
        out.idempotency_key = request.idempotency_key.clone();
        Ok(out)
    }

    fn transform_response(&self, response: &Value) -> ResponseDto {
        image_response(ResponseType::ImageGeneration, response)
    }
}

#[derive(Debug, Clone)]
pub struct ImageEditAdapter {
    validator: Arc<dyn FileValidator>,
}

impl ImageEditAdapter {
    pub fn new(validator: Arc<dyn FileValidator>) -> Self {
        Self { validator }
    }
}

impl EndpointAdapter for ImageEditAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::ImageEdit
    }

    fn transform_request(&self, request: &UnifiedRequest) -> Result<EndpointRequest> {
        let source = self.endpoint().as_str();
        let image = image_of(request, source)?;
        let path = image
            .image
            .as_deref()
            .ok_or_else(|| invalid("image.image is required for edits", "image.image", source))?;
        check_file(self.validator.as_ref(), path, &PNG_FILE_RULES, "image.image", source)?;
        let prompt = check_prompt(image, source)?;

        let mut out = EndpointRequest::new(self.endpoint());
        out.set_file("image", path);
        if let Some(mask) = image.mask.as_deref() {
            check_file(self.validator.as_ref(), mask, &PNG_FILE_RULES, "image.mask", source)?;
            out.set_file("mask", mask);
        }
        out.set("prompt", prompt);
        let model = image.model.as_deref().unwrap_or(DEFAULT_EDIT_MODEL);
        common_fields(&mut out, image, model, source)?;
        out.idempotency_key = request.idempotency_key.clone();
        Ok(out)
    }

    fn transform_response(&self, response: &Value) -> ResponseDto {
        image_response(ResponseType::ImageEdit, response)
    }
}

#[derive(Debug, Clone)]
pub struct ImageVariationAdapter {
    validator: Arc<dyn FileValidator>,
}

impl ImageVariationAdapter {
    pub fn new(validator: Arc<dyn FileValidator>) -> Self {
        Self { validator }
    }
}

impl EndpointAdapter for ImageVariationAdapter {
    fn endpoint(&self) -> Endpoint {
        Endpoint::ImageVariation
    }

    fn transform_request(&self, request: &UnifiedRequest) -> Result<EndpointRequest> {
        let source = self.endpoint().as_str();
        let image = image_of(request, source)?;
        let path = image.image.as_deref().ok_or_else(|| {
            invalid("image.image is required for variations", "image.image", source)
        })?;
        check_file(self.validator.as_ref(), path, &PNG_FILE_RULES, "image.image", source)?;

        let mut out = EndpointRequest::new(self.endpoint());
        out.set_file("image", path);
        let model = image.model.as_deref().unwrap_or(DEFAULT_EDIT_MODEL);
        common_fields(&mut out, image, model, source)?;
        out.idempotency_key = request.idempotency_key.clone();
        Ok(out)
    }

    fn transform_response(&self, response: &Value) -> ResponseDto {
        image_response(ResponseType::ImageVariation, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FileRules, FileValidationError, FsFileValidator};
    use crate::Error;
    use serde_json::json;
    use std::path::Path;

    #[derive(Debug)]
    struct AcceptAll;

    impl FileValidator for AcceptAll {
        fn validate(&self, _: &Path, _: &FileRules) -> std::result::Result<(), FileValidationError> {
            Ok(())
        }
    }

    fn generate(cfg: ImageConfig) -> Result<EndpointRequest> {
        ImageGenerationAdapter.transform_request(&UnifiedRequest::new().with_image(cfg))
    }

    #[test]
    fn generation_defaults() {
        let out = generate(ImageConfig::generate("a red fox")).unwrap();
        assert_eq!(
            out.body(),
            json!({
                "prompt": "a red fox",
                "model": "dall-e-3",
                "size": "1024x1024",
                "n": 1,
                "response_format": "url",
                "quality": "standard",
                "style": "vivid"
            })
        );
        assert!(out.file_fields.is_empty());
    }

    #[test]
    fn generation_validation() {
        assert!(generate(ImageConfig::default()).is_err());
        assert!(generate(ImageConfig::generate("x".repeat(4001))).is_err());
        assert!(generate(ImageConfig::generate("x").size("256x256")).is_err());
        assert!(generate(ImageConfig::generate("x").n(2)).is_err());
        assert!(generate(ImageConfig::generate("x").quality("ultra")).is_err());
        assert!(generate(ImageConfig::generate("x").model("dall-e-2").n(4)).is_ok());
        assert!(generate(ImageConfig::generate("x").model("dall-e-2").n(11)).is_err());
    }

    #[test]
    fn dall_e_2_drops_quality_and_style() {
        let out = generate(
            ImageConfig::generate("x")
                .model("dall-e-2")
                .size("512x512")
                .quality("hd")
                .style("natural"),
        )
        .unwrap();
        assert!(out.get("quality").is_none());
        assert!(out.get("style").is_none());
    }

    #[test]
    fn edit_uploads_image_and_mask() {
        let adapter = ImageEditAdapter::new(Arc::new(AcceptAll));
        let req = UnifiedRequest::new()
            .with_image(ImageConfig::edit("in.png", "add a hat").mask("mask.png").n(3));
        let out = adapter.transform_request(&req).unwrap();
        assert_eq!(out.file_fields, vec!["image".to_string(), "mask".to_string()]);
        assert_eq!(out.get("model"), Some(&json!("dall-e-2")));
        assert_eq!(out.get("n"), Some(&json!(3)));
    }

    #[test]
    fn edit_rejects_non_png_on_disk() {
        let adapter = ImageEditAdapter::new(Arc::new(FsFileValidator));
        let req = UnifiedRequest::new().with_image(ImageConfig::edit("/nope/in.jpg", "x"));
        assert!(matches!(
            adapter.transform_request(&req),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn variation_has_no_prompt() {
        let adapter = ImageVariationAdapter::new(Arc::new(AcceptAll));
        let out = adapter
            .transform_request(&UnifiedRequest::new().with_image(ImageConfig::variation("in.png")))
            .unwrap();
        assert!(out.get("prompt").is_none());
        assert_eq!(out.get("size"), Some(&json!("1024x1024")));
    }

    #[test]
    fn response_preserves_revised_prompt() {
        let dto = ImageGenerationAdapter.transform_response(&json!({
            "created": 1700000000,
            "data": [{"url": "https://img/1.png", "revised_prompt": "a red fox, digital art"}]
        }));
        let images = dto.images.as_ref().unwrap();
        assert_eq!(images[0].url.as_deref(), Some("https://img/1.png"));
        assert_eq!(images[0].revised_prompt.as_deref(), Some("a red fox, digital art"));
        assert_eq!(dto.meta("created"), Some(&json!(1700000000)));

        let empty = ImageGenerationAdapter.transform_response(&json!({"unexpected": true}));
        assert!(empty.images.is_none());
    }
}
