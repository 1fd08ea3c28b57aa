use anyhow::{Context, Result};
use api::config::Settings;
use pipeline::{JsonFileSink, PipelineConfig, RunStatus};

const DEFAULT_TOPIC: &str = "Generative AI, AI Agents Development, LangChain and CrewAI courses";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    api::logging::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let topic = if args.is_empty() {
        DEFAULT_TOPIC.to_string()
    } else {
        args.join(" ")
    };

    let settings = Settings::from_env()?;
    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    let pipeline = api::build_pipeline(&settings, &config).context("Failed to build pipeline")?;
    let sink = JsonFileSink::new(&settings.reports_dir);

    let outcome = pipeline
        .run_and_export(&topic, &sink)
        .await
        .with_context(|| format!("Research run failed for {:?}", topic))?;

    println!("\nResearch: {}", outcome.topic);
    println!("   Queries: {} planned, {} with results", outcome.stats.queries_planned, outcome.stats.queries_succeeded);

    if outcome.status == RunStatus::Empty {
        println!("   No entities found.");
        return Ok(());
    }

    println!("   Entities: {}\n", outcome.entities.len());
    for entity in &outcome.entities {
        println!("- {}", entity.name);
        println!("    rating: {}  reviews: {}", entity.rating, entity.reviews.total_reviews);
        println!("    website: {}", entity.website);
        if !entity.services.is_empty() {
            println!("    offers: {}", entity.services.join(", "));
        }
    }

    if let Some(location) = &outcome.location {
        println!("\nReport written to {}", location);
    }

    Ok(())
}
