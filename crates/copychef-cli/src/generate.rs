//! One-off bulk generation from the command line.
//!
//! Runs the same pipeline the scheduler uses, but without a stored job row:
//! the request is assembled from flags and the result is printed, with an
//! optional `--save` to persist items the way scheduled runs do.

use clap::Args;

use copychef_core::normalize_model_selection;
use copychef_generator::{
    BulkGenerator, GenerationRequest, LlmBulkGenerator, ProviderClient, ProviderKeys,
    TriggerSource,
};

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Niche to generate for (repeatable)
    #[arg(long = "niche", required = true)]
    pub niches: Vec<String>,
    /// Target platform (repeatable)
    #[arg(long = "platform", required = true)]
    pub platforms: Vec<String>,
    /// Tone of voice (repeatable; cycled across combinations)
    #[arg(long = "tone", default_value = "friendly")]
    pub tones: Vec<String>,
    /// Content template (repeatable; cycled across combinations)
    #[arg(long = "template", default_value = "recipe_teaser")]
    pub templates: Vec<String>,
    /// AI model identifier (repeatable; the first entry drives generation)
    #[arg(long = "model", required = true)]
    pub models: Vec<String>,
    /// Amazon affiliate tag to append to captions
    #[arg(long)]
    pub affiliate_tag: Option<String>,
    /// Append an affiliate search link to each caption
    #[arg(long)]
    pub generate_affiliate_links: bool,
    /// Let the model pick styling for the target platform
    #[arg(long)]
    pub use_smart_style: bool,
    /// Persist generated items to the database
    #[arg(long)]
    pub save: bool,
    /// Print the combinations without calling any provider
    #[arg(long)]
    pub dry_run: bool,
}

pub(crate) async fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let config = copychef_core::load_app_config()?;
    let ai_models = normalize_model_selection(args.models)
        .map_err(|e| anyhow::anyhow!("invalid --model selection: {e}"))?;

    let request = GenerationRequest {
        job_id: None,
        niches: args.niches,
        tones: args.tones,
        templates: args.templates,
        platforms: args.platforms,
        use_existing_products: false,
        generate_affiliate_links: args.generate_affiliate_links,
        use_smart_style: args.use_smart_style,
        ai_models,
        affiliate_tag: args.affiliate_tag,
        webhook_url: None,
        send_to_webhook: false,
        trigger_source: TriggerSource::Manual,
    };

    if args.dry_run {
        println!(
            "dry-run: would generate {} item(s): {} niche(s) x {} platform(s), model {}",
            request.niches.len() * request.platforms.len(),
            request.niches.len(),
            request.platforms.len(),
            request.ai_models[0]
        );
        return Ok(());
    }

    let client = ProviderClient::new(
        ProviderKeys::from_app_config(&config),
        config.generator_request_timeout_secs,
    )?;
    let generator = LlmBulkGenerator::new(client, config.generator_max_concurrent_items);

    let outcome = generator.generate(&request).await?;

    for item in &outcome.items {
        println!("--- {}/{} ({}, {}) via {}", item.niche, item.platform, item.tone, item.template, item.model);
        println!("script:  {}", item.script);
        println!("caption: {}", item.caption);
        println!("hashtags: {}", item.hashtags.join(" "));
    }
    for error in &outcome.errors {
        eprintln!("error: {error}");
    }
    println!(
        "generated {} item(s), {} combination(s) failed",
        outcome.generated(),
        outcome.failed
    );

    if args.save && !outcome.items.is_empty() {
        let pool = copychef_db::connect_pool_from_env().await?;
        let items: Vec<copychef_db::NewContentItem> = outcome
            .items
            .iter()
            .map(|item| copychef_db::NewContentItem {
                job_id: None,
                niche: item.niche.clone(),
                platform: item.platform.clone(),
                tone: item.tone.clone(),
                template: item.template.clone(),
                model: item.model.clone(),
                script: item.script.clone(),
                caption: item.caption.clone(),
                hashtags: item.hashtags.clone(),
                trigger_source: request.trigger_source.as_str().to_string(),
            })
            .collect();
        let saved = copychef_db::insert_content_items(&pool, &items).await?;
        println!("saved {saved} item(s)");
    }

    Ok(())
}
