use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatcloud::config::ColorScheme;
use chatcloud::export::{write_json, WordCloudData};
use chatcloud::fetch::export_channel;
use chatcloud::layout::{assign_rotations, LayoutRequest};
use chatcloud::{
    prepare_cloud, CloudBuilder, Config, MessageFilter, ScoringPolicy, Session, SlackClient,
    Uploader,
};

/// Word-cloud data from chat exports.
#[derive(Debug, Parser)]
#[command(name = "chatcloud", author, version, about)]
struct Cli {
    /// Config file (defaults to the user config dir when present)
    #[arg(short, long, env = "CHATCLOUD_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build word-cloud data from chat-export CSV files and styled JSON word lists
    Cloud(CloudArgs),
    /// Export a Slack channel's history to a chat-export CSV file
    Fetch(FetchArgs),
}

#[derive(Debug, Args)]
struct CloudArgs {
    /// Files to upload, processed in the order given (.csv or .json)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Where to write the word-cloud JSON (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the request for an external layout engine
    #[arg(long)]
    layout_request: Option<PathBuf>,

    /// Maximum number of words in the cloud
    #[arg(long)]
    max_words: Option<usize>,

    /// Drop words seen fewer times than this
    #[arg(long)]
    min_count: Option<u64>,

    /// Color for words without a style override
    #[arg(long, value_enum)]
    color_scheme: Option<ColorScheme>,
}

impl CloudArgs {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(max_words) = self.max_words {
            config.policy.max_items = max_words;
        }
        if let Some(min_count) = self.min_count {
            config.policy.min_count = min_count;
        }
        if let Some(scheme) = self.color_scheme {
            config.cloud.color_scheme = scheme;
        }
    }
}

#[derive(Debug, Args)]
struct FetchArgs {
    /// Slack bot token
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    token: String,

    /// Channel ID, e.g. C0123456789
    #[arg(long)]
    channel: String,

    /// Directory for the CSV file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Leave out the ThreadTS column
    #[arg(long)]
    without_thread: bool,

    /// Join the channel before reading it
    #[arg(long)]
    join: bool,
}

impl FetchArgs {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.slack.output_dir = dir.clone();
        }
        if self.without_thread {
            config.slack.include_thread = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stderr only: stdout carries the JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatcloud=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Cloud(args) => {
            args.apply_overrides(&mut config);
            config.validate().context("invalid settings")?;
            cloud(args, config).await
        }
        Command::Fetch(args) => {
            args.apply_overrides(&mut config);
            config.validate().context("invalid settings")?;
            fetch(args, config).await
        }
    }
}

async fn cloud(args: CloudArgs, config: Config) -> Result<()> {
    let policy = ScoringPolicy::new(&config.policy).context("invalid scoring policy")?;
    let builder = CloudBuilder::new(config.cloud.clone());
    let uploader = Uploader::new(config.upload.clone());
    let mut session = Session::new(
        config.analysis.clone(),
        MessageFilter::new(config.filter.clone()),
    );

    let outcomes = uploader.upload_all(&mut session, &args.files).await;
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failed == outcomes.len() {
        bail!("none of the {} file(s) could be processed", outcomes.len());
    }
    if failed > 0 {
        warn!(failed, total = outcomes.len(), "some files were skipped");
    }

    let mut items = prepare_cloud(&session, &builder, &policy);
    assign_rotations(&mut items, &config.layout.rotation);
    info!(
        words = items.len(),
        distinct = session.counts().len(),
        "prepared word cloud"
    );

    if let Some(path) = &args.layout_request {
        write_json(&LayoutRequest::new(&items, &config.layout), path).await?;
    }

    let data = WordCloudData::new(items, &session.counts());
    match &args.output {
        Some(path) => write_json(&data, path).await?,
        None => println!("{}", data.to_json()?),
    }

    Ok(())
}

async fn fetch(args: FetchArgs, config: Config) -> Result<()> {
    let token = args.token.trim();
    let channel = args.channel.trim();
    if token.is_empty() || channel.is_empty() {
        bail!("--token and --channel must not be empty");
    }

    let client = SlackClient::new(token, &config.slack);
    client
        .validate()
        .await
        .context("Slack token validation failed")?;
    if args.join {
        client
            .join_channel(channel)
            .await
            .with_context(|| format!("failed to join channel {channel}"))?;
    }

    let path = export_channel(&client, channel, &config.slack).await?;
    println!("{}", path.display());
    Ok(())
}
