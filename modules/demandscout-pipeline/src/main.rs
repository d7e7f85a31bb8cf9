use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use demandscout_common::Config;
use demandscout_pipeline::judge::{HeuristicJudge, OpenAiJudge};
use demandscout_pipeline::ledger::{JsonFileStore, PostingLedger};
use demandscout_pipeline::pipeline::Pipeline;
use demandscout_pipeline::poster::HttpIdeaPoster;
use demandscout_pipeline::report::ReportWriter;
use demandscout_pipeline::sources::JsonlItemSource;
use demandscout_pipeline::traits::DemandJudge;

/// Mine demand statements from social posts, cluster them, and publish each
/// cluster to the tracking site at most once across all runs.
#[derive(Parser, Debug)]
#[command(name = "demandscout", version)]
struct Args {
    /// JSON Lines file of mined posts, one object per line
    #[arg(long)]
    input: String,

    /// Posting ledger path (overrides STATE_FILE)
    #[arg(long)]
    state_file: Option<String>,

    /// Directory for run reports (overrides OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<String>,

    /// Skip items older than this many days
    #[arg(long)]
    max_age_days: Option<i64>,

    /// Judge and report without posting or recording anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("demandscout=info".parse()?))
        .init();

    let args = Args::parse();
    let config = Config::from_env();

    info!("Demand Scout starting...");

    let source = JsonlItemSource::new(&args.input);
    let poster = HttpIdeaPoster::new(&config.site_url);
    let judge: Box<dyn DemandJudge> = if config.openai_api_key.is_empty() {
        info!("No judge API key configured, using heuristic judge");
        Box::new(HeuristicJudge::default())
    } else {
        info!(model = %config.judge_model, "Using LLM judge");
        Box::new(
            OpenAiJudge::new(&config.openai_api_key, &config.judge_model)
                .with_base_url(&config.judge_base_url),
        )
    };

    let state_file = args.state_file.unwrap_or(config.state_file);
    let mut ledger = PostingLedger::load(Box::new(JsonFileStore::new(&state_file)))?;

    let mut pipeline = Pipeline::new(
        &source,
        judge.as_ref(),
        &poster,
        config.similarity_threshold,
        config.min_confidence,
    )
    .dry_run(args.dry_run);
    if let Some(days) = args.max_age_days {
        pipeline = pipeline.max_age_days(days);
    }

    let output = pipeline.run(&mut ledger).await?;

    let output_dir = args.output_dir.unwrap_or(config.output_dir);
    let run_dir = ReportWriter::new(&output_dir).write(&output.run_id, &output.stats, &output.rows)?;

    println!("{}", output.stats);
    println!("Reports written to {}", run_dir.display());

    Ok(())
}
