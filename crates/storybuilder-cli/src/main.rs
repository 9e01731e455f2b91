//! CLI binary for running Storybuilder batches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use storybuilder_feeds::{FeedAggregator, HttpFeedSource};
use storybuilder_llm::{CostTrackingMiddleware, ImageRequest, LlmClient, LoggingMiddleware};
use storybuilder_pipeline::{
    BackoffPolicy, BatchConfig, BatchReport, HeadlineOutcome, HistoryStore, Orchestrator,
    RetryPolicy, DEFAULT_HISTORY_FILE,
};
use storybuilder_publish::{PostPayload, PostStatus, Publisher, WordPressCredentials, WordPressPublisher};
use storybuilder_search::DuckDuckGoClient;
use storybuilder_types::PersonalityRegistry;

const HISTORY_ENV: &str = "STORYBUILDER_HISTORY";
const DEFAULT_IMAGE_PROMPT: &str = "A futuristic city skyline at sunset, synthwave style";
const PLACEHOLDER_IMAGE_URL: &str =
    "https://www.google.com/images/branding/googlelogo/2x/googlelogo_color_272x92dp.png";

#[derive(Parser)]
#[command(
    name = "storybuilder",
    version,
    about = "Turn news headlines into personality-voiced stories and publish them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch headlines and run one batch for a personality
    Run {
        /// Personality identifier (see `storybuilder personalities`)
        #[arg(short, long)]
        personality: String,

        /// Generate stories but do not publish or record history
        #[arg(long)]
        dry_run: bool,

        /// History file (default: $STORYBUILDER_HISTORY or history.json)
        #[arg(long)]
        history: Option<PathBuf>,

        /// TOML file replacing the built-in personalities
        #[arg(long)]
        personalities: Option<PathBuf>,

        /// Headlines processed at once
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Extra attempts for rate-limited or 5xx collaborator calls
        #[arg(long, default_value_t = 0)]
        retries: usize,

        /// Post status: draft, publish or private
        #[arg(long, default_value = "draft")]
        status: PostStatus,
    },

    /// List the configured personalities
    Personalities {
        /// TOML file replacing the built-in personalities
        #[arg(long)]
        personalities: Option<PathBuf>,
    },

    /// Show the processed-headline history
    History {
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Upload a test image and create a draft post that features it
    ImageCheck {
        #[arg(short, long)]
        personality: String,

        /// Prompt for the generated image
        #[arg(long, default_value = DEFAULT_IMAGE_PROMPT)]
        prompt: String,

        /// Upload a fixed placeholder image instead of generating one
        #[arg(long)]
        skip_gen: bool,

        #[arg(long)]
        personalities: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            personality,
            dry_run,
            history,
            personalities,
            concurrency,
            retries,
            status,
        } => {
            let config = BatchConfig {
                dry_run,
                post_status: status,
                concurrency: concurrency.max(1),
                retry: retry_policy(retries),
                ..BatchConfig::default()
            };
            cmd_run(
                &personality,
                &history_path(history),
                personalities.as_deref(),
                config,
            )
            .await?;
        }
        Commands::Personalities { personalities } => {
            cmd_personalities(personalities.as_deref())?;
        }
        Commands::History { history } => {
            cmd_history(&history_path(history)).await;
        }
        Commands::ImageCheck {
            personality,
            prompt,
            skip_gen,
            personalities,
        } => {
            cmd_image_check(&personality, &prompt, skip_gen, personalities.as_deref()).await?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn history_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os(HISTORY_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE))
}

fn retry_policy(retries: usize) -> RetryPolicy {
    if retries == 0 {
        RetryPolicy::none()
    } else {
        RetryPolicy::new(retries, BackoffPolicy::default())
    }
}

fn load_registry(path: Option<&Path>) -> anyhow::Result<PersonalityRegistry> {
    Ok(match path {
        Some(p) => PersonalityRegistry::from_toml_file(p)?,
        None => PersonalityRegistry::builtin(),
    })
}

fn display_name(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_run(
    personality_id: &str,
    history_path: &Path,
    personalities: Option<&Path>,
    config: BatchConfig,
) -> anyhow::Result<()> {
    // Everything that can fail on configuration is resolved before any
    // headline is fetched.
    let registry = load_registry(personalities)?;
    let personality = registry.get(personality_id)?.clone();

    let cost = CostTrackingMiddleware::new();
    let llm = LlmClient::from_env()?
        .with_middleware(LoggingMiddleware)
        .with_middleware(cost.clone());

    let publisher: Option<Arc<dyn Publisher>> = if config.dry_run {
        None
    } else {
        let credentials = WordPressCredentials::from_env(&personality)?;
        tracing::debug!(?credentials, "Resolved publishing credentials");
        let publisher: Arc<dyn Publisher> = Arc::new(WordPressPublisher::new(credentials)?);
        Some(publisher)
    };

    println!(
        "--- Starting Storybuilder (Personality: {} / {}) ---",
        personality.id, personality.style
    );
    if config.dry_run {
        println!("(dry run: nothing is published and history is not updated)");
    }

    let history = HistoryStore::load(history_path).await;
    println!("Loaded {} previously processed headlines.", history.len());

    let orchestrator = Orchestrator::new(
        Arc::new(llm),
        Arc::new(DuckDuckGoClient::new()?),
        publisher,
        history,
        config,
    )?;
    let aggregator = FeedAggregator::new(Arc::new(HttpFeedSource::new()?));

    let report = orchestrator
        .run_from_feeds(&personality, &aggregator)
        .await?;

    if report.headlines_found == 0 {
        println!("No headlines found. Exiting.");
        return Ok(());
    }

    print_report(&report);
    println!(
        "LLM usage: {} requests, {} input tokens, {} output tokens",
        cost.request_count(),
        cost.total_input_tokens(),
        cost.total_output_tokens()
    );
    Ok(())
}

fn print_report(report: &BatchReport) {
    println!("Found {} headlines.", report.headlines_found);

    for r in &report.reports {
        let headline = r.headline.preview(50);
        match &r.outcome {
            HeadlineOutcome::Deduped => println!("Skipping duplicate: {headline}..."),
            HeadlineOutcome::DraftFailed { reason } => {
                println!("\n[{}] {headline}...\n  Draft failed: {reason}", r.index)
            }
            HeadlineOutcome::Previewed {
                title,
                content_chars,
                preview,
                image_url,
            } => {
                println!("\n[{}] {headline}...", r.index);
                println!("  Generated Title: {title}");
                println!("  Generated story length: {content_chars} chars");
                println!("  Research sources: {}", r.findings);
                match image_url {
                    Some(url) => println!("  Image: {url}"),
                    None => println!("  Image: none"),
                }
                println!("  Content Preview: {preview}...");
            }
            HeadlineOutcome::Published {
                title,
                permalink,
                featured_media,
            } => {
                println!("\n[{}] {headline}...", r.index);
                println!("  Published \"{title}\": {permalink}");
                if let Some(id) = featured_media {
                    println!("  Featured media: {id}");
                }
            }
            HeadlineOutcome::PublishFailed { title, reason } => {
                println!("\n[{}] {headline}...", r.index);
                println!("  Failed to publish \"{title}\": {reason}");
            }
        }
    }

    println!(
        "\nDone. Processed {} new stories.",
        report.processed_count()
    );
    println!(
        "  published: {}, publish failed: {}, previewed: {}, draft failed: {}, skipped: {}",
        report.published_count(),
        report.publish_failed_count(),
        report.previewed_count(),
        report.draft_failed_count(),
        report.skipped_count()
    );
}

fn cmd_personalities(personalities: Option<&Path>) -> anyhow::Result<()> {
    let registry = load_registry(personalities)?;
    println!("{} personalities:", registry.len());
    for p in registry.iter() {
        let feeds = match p.feeds.as_ref() {
            Some(list) => format!("{} feeds", list.len()),
            None => "default feeds".to_string(),
        };
        println!(
            "  {:<10} {:<14} {:<14} credentials: {} / {}",
            p.id, p.style, feeds, p.env_user_key, p.env_pass_key
        );
    }
    Ok(())
}

async fn cmd_history(path: &Path) {
    let history = HistoryStore::load(path).await;
    println!("{}: {} processed headlines", path.display(), history.len());
    for headline in history.iter() {
        println!("  {headline}");
    }
}

async fn cmd_image_check(
    personality_id: &str,
    prompt: &str,
    skip_gen: bool,
    personalities: Option<&Path>,
) -> anyhow::Result<()> {
    let registry = load_registry(personalities)?;
    let personality = registry.get(personality_id)?;
    let publisher = WordPressPublisher::new(WordPressCredentials::from_env(personality)?)?;

    let image_url = if skip_gen {
        println!("Skipping generation, using placeholder image.");
        PLACEHOLDER_IMAGE_URL.to_string()
    } else {
        println!("Generating image for prompt: {prompt}");
        let llm = LlmClient::from_env()?;
        llm.generate_image(&ImageRequest::wide("", prompt)).await?.url
    };
    println!("Image URL: {image_url}");

    let media_id = publisher.upload_media(&image_url).await?;
    println!("Uploaded media ID: {media_id}");

    let post = PostPayload::new(
        format!("Test Image Upload - {}", display_name(&personality.id)),
        format!(
            "<p>This is a test post to verify image upload for {}.</p>",
            personality.id
        ),
        PostStatus::Draft,
    )
    .with_featured_media(Some(media_id));
    let link = publisher.create_post(&post).await?;
    println!("Created draft post: {link}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
