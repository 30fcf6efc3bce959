mod aggregate;
mod answer;
mod config;
mod error;
mod feed;
mod prompt;
mod render;

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use answer::{AnswerRequestor, OpenAiTransport, StructuredAnswer};
use config::{Cli, Config, FeedTarget, OutputFormat};
use error::{AppError, AppResult};
use feed::FeedReader;
use render::{JsonRenderer, Renderer, TerminalRenderer};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; real environment variables still apply
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match Config::from_cli(cli, ask_interactively) {
        Ok(config) => config,
        Err(e) => return fail(e),
    };

    match run(&config).await {
        Ok(answer) => {
            let renderer: Box<dyn Renderer> = match config.output {
                OutputFormat::Json => Box::new(JsonRenderer),
                OutputFormat::Terminal => Box::new(TerminalRenderer {
                    styled: std::io::stdout().is_terminal(),
                }),
            };
            if let Err(e) = renderer.render(&answer, &mut std::io::stdout().lock()) {
                eprintln!("Error: failed to write output: {e}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// One fetch-summarize-answer cycle.
async fn run(config: &Config) -> AppResult<StructuredAnswer> {
    answer::require_credential(config.api_key.as_deref())?;

    let reader = match &config.target {
        FeedTarget::Subreddit { name, source } => {
            FeedReader::for_subreddit(&config.feed_host, name, *source, config.feed_timeout)?
        }
        FeedTarget::Url(url) => FeedReader::for_url(url, config.feed_timeout)?,
    };
    info!(url = reader.url(), "Reading feed");

    let entries = reader.fetch_entries().await?;
    let content = aggregate::aggregate(&entries, config.budget);
    debug!(
        chars = content.chars().count(),
        max_chars = config.budget.map(|b| b.max_chars()),
        "Aggregated feed content"
    );

    let prompt = config.template.build(&content, &config.question)?;

    let transport = OpenAiTransport::new(&config.api_base, config.completion_timeout)?;
    let requestor = AnswerRequestor::new(transport, config.api_key.clone(), config.model.as_str());
    requestor.ask(&prompt).await
}

fn ask_interactively(label: &str) -> AppResult<String> {
    if !std::io::stdin().is_terminal() {
        return Err(AppError::InvalidInput(format!(
            "missing argument and stdin is not a terminal: {}",
            label.trim_end_matches(':')
        )));
    }
    inquire::Text::new(label)
        .prompt()
        .map_err(|e| AppError::InvalidInput(e.to_string()))
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn fail(e: AppError) -> ExitCode {
    error!(error = %e, "Run failed");
    eprintln!("Error: {e}");
    ExitCode::FAILURE
}
