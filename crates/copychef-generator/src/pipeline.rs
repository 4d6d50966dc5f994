//! The bulk-generation pipeline: one item per niche x platform combination.

use async_trait::async_trait;
use futures::{stream, StreamExt};

use crate::prompt::{build_prompt, parse_completion, PromptInput};
use crate::provider::ProviderClient;
use crate::types::{GeneratedItem, GenerationOutcome, GenerationRequest};
use crate::GeneratorError;

/// The bulk-generation entry point.
///
/// Both the HTTP route and the scheduler's job runner call this directly with
/// a typed request; tests substitute their own implementation.
#[async_trait]
pub trait BulkGenerator: Send + Sync {
    /// Run one bulk generation and return its structured outcome.
    ///
    /// Per-combination provider failures are collected into the outcome, not
    /// returned as errors; `Err` means the run could not start at all.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, GeneratorError>;
}

/// LLM-backed implementation over [`ProviderClient`].
pub struct LlmBulkGenerator {
    client: ProviderClient,
    max_concurrent: usize,
}

impl LlmBulkGenerator {
    #[must_use]
    pub fn new(client: ProviderClient, max_concurrent: usize) -> Self {
        Self {
            client,
            max_concurrent: max_concurrent.max(1),
        }
    }

    async fn generate_one(
        &self,
        request: &GenerationRequest,
        model: &str,
        index: usize,
        niche: &str,
        platform: &str,
    ) -> Result<GeneratedItem, String> {
        // Tones and templates cycle across combinations so every configured
        // value gets used without multiplying the run size.
        let tone = cycle(&request.tones, index);
        let template = cycle(&request.templates, index);

        let prompt = build_prompt(&PromptInput {
            niche,
            platform,
            tone,
            template,
            use_existing_products: request.use_existing_products,
            use_smart_style: request.use_smart_style,
        });

        let completion = self
            .client
            .complete(model, &prompt)
            .await
            .map_err(|e| format!("{niche}/{platform}: {e}"))?;

        let parsed = parse_completion(&completion);
        let mut caption = parsed.caption;
        if request.generate_affiliate_links {
            if let Some(tag) = request.affiliate_tag.as_deref() {
                caption.push_str(&format!("\n\nShop: {}", affiliate_link(niche, tag)));
            }
        }

        Ok(GeneratedItem {
            niche: niche.to_string(),
            platform: platform.to_string(),
            tone: tone.to_string(),
            template: template.to_string(),
            model: model.to_string(),
            script: parsed.script,
            caption,
            hashtags: parsed.hashtags,
        })
    }
}

#[async_trait]
impl BulkGenerator for LlmBulkGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, GeneratorError> {
        let model = request
            .ai_models
            .first()
            .ok_or(GeneratorError::NoModelSelected)?;

        // Owned copies: borrowing niche/platform out of `request` across the
        // buffered futures trips rustc's higher-ranked lifetime inference.
        let combos: Vec<(usize, String, String)> = request
            .niches
            .iter()
            .flat_map(|n| request.platforms.iter().map(move |p| (n.clone(), p.clone())))
            .enumerate()
            .map(|(i, (n, p))| (i, n, p))
            .collect();

        tracing::info!(
            combinations = combos.len(),
            model,
            trigger = %request.trigger_source,
            "bulk generation starting"
        );

        let results: Vec<Result<GeneratedItem, String>> = stream::iter(combos)
            .map(|(index, niche, platform)| async move {
                self.generate_one(request, model, index, &niche, &platform)
                    .await
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut outcome = GenerationOutcome::default();
        for result in results {
            match result {
                Ok(item) => outcome.items.push(item),
                Err(message) => {
                    tracing::warn!(error = %message, "combination failed");
                    outcome.failed += 1;
                    outcome.errors.push(message);
                }
            }
        }

        tracing::info!(
            generated = outcome.generated(),
            failed = outcome.failed,
            "bulk generation complete"
        );
        Ok(outcome)
    }
}

/// Pick the value for combination `index`, wrapping around the list.
fn cycle(values: &[String], index: usize) -> &str {
    if values.is_empty() {
        return "default";
    }
    &values[index % values.len()]
}

fn affiliate_link(niche: &str, tag: &str) -> String {
    let query: String = niche
        .chars()
        .map(|c| if c.is_whitespace() { '+' } else { c })
        .collect();
    format!("https://www.amazon.com/s?k={query}&tag={tag}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKeys;
    use crate::types::TriggerSource;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        GenerationRequest {
            job_id: Some(7),
            niches: vec!["pasta".to_string(), "grilling".to_string()],
            tones: vec!["playful".to_string(), "expert".to_string()],
            templates: vec!["recipe_teaser".to_string()],
            platforms: vec!["tiktok".to_string(), "instagram".to_string()],
            use_existing_products: false,
            generate_affiliate_links: true,
            use_smart_style: true,
            ai_models: vec!["gpt-4o".to_string()],
            affiliate_tag: Some("chef-21".to_string()),
            webhook_url: None,
            send_to_webhook: false,
            trigger_source: TriggerSource::Scheduled,
        }
    }

    fn generator_against(server: &MockServer) -> LlmBulkGenerator {
        let uri = server.uri();
        let keys = ProviderKeys {
            openai: Some("sk-test".to_string()),
            ..ProviderKeys::default()
        };
        let client = ProviderClient::with_base_urls(keys, 10, &uri, &uri, &uri)
            .expect("client construction should not fail");
        LlmBulkGenerator::new(client, 2)
    }

    #[test]
    fn cycle_wraps_and_survives_empty() {
        let values = vec!["a".to_string(), "b".to_string()];
        assert_eq!(cycle(&values, 0), "a");
        assert_eq!(cycle(&values, 3), "b");
        assert_eq!(cycle(&[], 5), "default");
    }

    #[test]
    fn affiliate_link_embeds_tag_and_niche() {
        let link = affiliate_link("cast iron", "chef-21");
        assert_eq!(link, "https://www.amazon.com/s?k=cast+iron&tag=chef-21");
    }

    #[tokio::test]
    async fn generates_one_item_per_niche_platform_combination() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant",
                    "content": "SCRIPT:\nDo the thing.\nCAPTION:\nA caption.\nHASHTAGS: #food" } }]
            })))
            .expect(4)
            .mount(&server)
            .await;

        let generator = generator_against(&server);
        let outcome = generator
            .generate(&request())
            .await
            .expect("run should start");

        assert_eq!(outcome.generated(), 4, "2 niches x 2 platforms");
        assert_eq!(outcome.failed, 0);
        assert!(outcome.is_success());

        let item = &outcome.items[0];
        assert_eq!(item.model, "gpt-4o");
        assert_eq!(item.script, "Do the thing.");
        assert!(item.caption.contains("A caption."));
        assert!(
            item.caption.contains("tag=chef-21"),
            "affiliate link appended: {}",
            item.caption
        );
        assert_eq!(item.hashtags, vec!["#food"]);
    }

    #[tokio::test]
    async fn more_combinations_than_concurrency_limit_all_complete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant",
                    "content": "SCRIPT:\nShort.\nCAPTION:\nShort.\nHASHTAGS: #ok" } }]
            })))
            .expect(6)
            .mount(&server)
            .await;

        let generator = generator_against(&server);
        let mut req = request();
        req.niches.push("meal prep".to_string());

        let outcome = generator.generate(&req).await.expect("run should start");
        assert_eq!(outcome.generated(), 6, "3 niches x 2 platforms through a width-2 buffer");
        assert_eq!(outcome.failed, 0);
    }

    #[tokio::test]
    async fn provider_failures_are_collected_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let generator = generator_against(&server);
        let outcome = generator
            .generate(&request())
            .await
            .expect("run itself still completes");

        assert_eq!(outcome.generated(), 0);
        assert_eq!(outcome.failed, 4);
        assert!(!outcome.is_success());
        assert!(outcome.errors.iter().all(|e| e.contains("500")));
    }

    #[tokio::test]
    async fn empty_model_list_cannot_start() {
        let server = MockServer::start().await;
        let generator = generator_against(&server);
        let mut req = request();
        req.ai_models.clear();

        let err = generator.generate(&req).await.expect_err("no model");
        assert!(matches!(err, GeneratorError::NoModelSelected));
    }
}
