use std::time::Duration;

use clap::Parser;

use crate::aggregate::{ContentBudget, DEFAULT_MAX_TOKENS};
use crate::answer::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::error::{AppError, AppResult};
use crate::feed::{normalize_subreddit, FeedSource, DEFAULT_FEED_HOST};
use crate::prompt::PromptTemplate;

#[derive(Parser, Debug)]
#[command(name = "reddit-questioner")]
#[command(
    version,
    about = "Summarize recent posts from a subreddit and answer a question about them"
)]
pub struct Cli {
    /// Subreddit name (e.g. `rust` or `r/rust`), or a full RSS/Atom feed URL
    pub subreddit: Option<String>,

    /// Question to ask about the posts
    pub question: Option<String>,

    /// Upstream document shape to request
    #[arg(long, value_enum, env = "REDDIT_QUESTIONER_SOURCE", default_value_t = FeedSource::Rss)]
    pub source: FeedSource,

    /// Base URL the subreddit feed is fetched from
    #[arg(long, env = "REDDIT_QUESTIONER_FEED_HOST", default_value = DEFAULT_FEED_HOST)]
    pub feed_host: String,

    /// Approximate token budget for the aggregated posts; 0 disables truncation
    #[arg(long, env = "REDDIT_QUESTIONER_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: usize,

    /// Completion service credential
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat model identifier
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Override for the system instruction
    #[arg(long, env = "REDDIT_QUESTIONER_SYSTEM_PROMPT")]
    pub system_prompt: Option<String>,

    /// Override for the user prompt; must use `{content}` and `{question}`
    #[arg(long, env = "REDDIT_QUESTIONER_PROMPT_TEMPLATE")]
    pub prompt_template: Option<String>,

    /// Feed request timeout in seconds
    #[arg(long, env = "REDDIT_QUESTIONER_FEED_TIMEOUT_SECS", default_value_t = 30)]
    pub feed_timeout: u64,

    /// Completion request timeout in seconds
    #[arg(long, env = "REDDIT_QUESTIONER_COMPLETION_TIMEOUT_SECS", default_value_t = 60)]
    pub completion_timeout: u64,

    /// Print the answer as JSON instead of headed sections
    #[arg(long)]
    pub json: bool,

    /// Log progress to stderr (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedTarget {
    Subreddit { name: String, source: FeedSource },
    Url(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Terminal,
    Json,
}

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub target: FeedTarget,
    pub question: String,
    pub feed_host: String,
    pub budget: Option<ContentBudget>,
    pub template: PromptTemplate,
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub feed_timeout: Duration,
    pub completion_timeout: Duration,
    pub output: OutputFormat,
}

impl Config {
    /// `ask` supplies values for positionals left off the command line.
    pub fn from_cli<F>(cli: Cli, mut ask: F) -> AppResult<Self>
    where
        F: FnMut(&str) -> AppResult<String>,
    {
        let subreddit = match cli.subreddit {
            Some(s) => s,
            None => ask("Subreddit (or feed URL):")?,
        };
        let question = match cli.question {
            Some(q) => q,
            None => ask("Question:")?,
        };

        let subreddit = subreddit.trim();
        let target = if subreddit.starts_with("http://") || subreddit.starts_with("https://") {
            FeedTarget::Url(subreddit.to_string())
        } else {
            FeedTarget::Subreddit {
                name: normalize_subreddit(subreddit)?,
                source: cli.source,
            }
        };

        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(AppError::InvalidInput("question is empty".to_string()));
        }

        let budget = (cli.max_tokens > 0).then(|| ContentBudget::from_tokens(cli.max_tokens));

        Ok(Self {
            target,
            question,
            feed_host: cli.feed_host,
            budget,
            template: PromptTemplate::new(cli.system_prompt, cli.prompt_template),
            api_key: cli.api_key,
            model: cli.model,
            api_base: cli.api_base,
            feed_timeout: Duration::from_secs(cli.feed_timeout),
            completion_timeout: Duration::from_secs(cli.completion_timeout),
            output: if cli.json {
                OutputFormat::Json
            } else {
                OutputFormat::Terminal
            },
        })
    }
}
