use std::time::Duration;

use rss::Channel;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{AppError, AppResult};

pub const DEFAULT_FEED_HOST: &str = "https://www.reddit.com";

// Browser identities; one is picked at random per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Which upstream document shape to request for a subreddit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FeedSource {
    /// `/r/<name>.rss`, parsed as RSS 2.0 or Atom
    #[default]
    Rss,
    /// `/r/<name>.json?sort=top&t=week`, a Reddit listing
    Json,
}

/// One post reduced to plain text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedEntry {
    pub title: String,
    pub body: String,
}

impl FeedEntry {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

pub struct FeedReader {
    client: reqwest::Client,
    url: String,
    source: FeedSource,
}

impl FeedReader {
    pub fn for_subreddit(
        host: &str,
        subreddit: &str,
        source: FeedSource,
        timeout: Duration,
    ) -> AppResult<Self> {
        let url = subreddit_url(host, subreddit, source)?;
        Self::new(url, source, timeout)
    }

    /// Reads an arbitrary syndication feed instead of a subreddit.
    pub fn for_url(url: &str, timeout: Duration) -> AppResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| AppError::InvalidInput(format!("invalid feed URL {url}: {e}")))?;
        Self::new(url.to_string(), FeedSource::Rss, timeout)
    }

    fn new(url: String, source: FeedSource, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::fetch(&url, e))?;

        Ok(Self {
            client,
            url,
            source,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch_entries(&self) -> AppResult<Vec<FeedEntry>> {
        let user_agent = random_user_agent();
        debug!(url = %self.url, user_agent, "Fetching feed");

        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| AppError::fetch(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(
                &self.url,
                format!("upstream returned status {status}"),
            ));
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| AppError::fetch(&self.url, e))?;
        debug!(bytes = content.len(), "Feed downloaded");

        let entries = entries_from(self.source, &self.url, &content)?;
        info!(count = entries.len(), "Fetched feed entries");
        Ok(entries)
    }
}

/// Parses a downloaded document; a feed without posts is an error.
pub fn entries_from(source: FeedSource, url: &str, content: &[u8]) -> AppResult<Vec<FeedEntry>> {
    let entries = match source {
        FeedSource::Rss => parse_syndication(content),
        FeedSource::Json => parse_listing(content),
    }
    .map_err(|reason| AppError::fetch(url, reason))?;

    if entries.is_empty() {
        return Err(AppError::EmptyFeed {
            source_url: url.to_string(),
        });
    }

    Ok(entries)
}

/// Accepts `name`, `r/name` or `/r/name/`.
pub fn normalize_subreddit(raw: &str) -> AppResult<String> {
    let trimmed = raw.trim().trim_start_matches('/');
    let name = trimmed
        .strip_prefix("r/")
        .or_else(|| trimmed.strip_prefix("R/"))
        .unwrap_or(trimmed)
        .trim_end_matches('/');

    if name.is_empty() {
        return Err(AppError::InvalidInput("subreddit name is empty".to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AppError::InvalidInput(format!(
            "invalid subreddit name: {name}"
        )));
    }

    Ok(name.to_string())
}

pub fn subreddit_url(host: &str, subreddit: &str, source: FeedSource) -> AppResult<String> {
    let name = normalize_subreddit(subreddit)?;
    let mut url = Url::parse(host)
        .map_err(|e| AppError::InvalidInput(format!("invalid feed host {host}: {e}")))?;

    let file = match source {
        FeedSource::Rss => format!("{name}.rss"),
        FeedSource::Json => format!("{name}.json"),
    };
    url.path_segments_mut()
        .map_err(|_| AppError::InvalidInput(format!("feed host cannot be a base URL: {host}")))?
        .pop_if_empty()
        .push("r")
        .push(&file);

    if source == FeedSource::Json {
        url.query_pairs_mut()
            .append_pair("sort", "top")
            .append_pair("t", "week");
    }

    Ok(url.to_string())
}

fn random_user_agent() -> &'static str {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
}

/// Parses an RSS 2.0 document, falling back to Atom for anything else.
pub fn parse_syndication(content: &[u8]) -> Result<Vec<FeedEntry>, String> {
    match Channel::read_from(content) {
        Ok(channel) => Ok(channel
            .items()
            .iter()
            .map(|item| {
                let body = item
                    .content()
                    .filter(|c| !c.is_empty())
                    .or(item.description())
                    .unwrap_or_default();
                FeedEntry::new(item.title().unwrap_or_default(), body)
            })
            .collect()),
        Err(rss_err) => {
            debug!(error = %rss_err, "Not an RSS channel, trying Atom");
            let feed = feed_rs::parser::parse(content).map_err(|e| e.to_string())?;
            Ok(feed
                .entries
                .into_iter()
                .map(|entry| {
                    let body = entry
                        .content
                        .and_then(|c| c.body)
                        .filter(|b| !b.is_empty())
                        .or_else(|| entry.summary.map(|s| s.content))
                        .unwrap_or_default();
                    let title = entry.title.map(|t| t.content).unwrap_or_default();
                    FeedEntry { title, body }
                })
                .collect())
        }
    }
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Deserialize)]
struct ListingChild {
    data: PostData,
}

#[derive(Deserialize)]
struct PostData {
    title: Option<String>,
    selftext: Option<String>,
}

pub fn parse_listing(content: &[u8]) -> Result<Vec<FeedEntry>, String> {
    let listing: Listing = serde_json::from_slice(content).map_err(|e| e.to_string())?;
    Ok(listing
        .data
        .children
        .into_iter()
        .map(|child| FeedEntry {
            title: child.data.title.unwrap_or_default(),
            body: child.data.selftext.unwrap_or_default(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>r/rust</title>
    <link>https://www.reddit.com/r/rust</link>
    <description>rust</description>
    <item>
      <title>First</title>
      <description>short description</description>
      <content:encoded><![CDATA[<p>full content</p>]]></content:encoded>
    </item>
    <item>
      <title>Second</title>
      <description>only a description</description>
    </item>
    <item>
      <description>untitled</description>
    </item>
  </channel>
</rss>"#;

    const ATOM_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>https://www.reddit.com/r/rust.rss</id>
  <title>Rust</title>
  <updated>2024-05-01T10:00:00+00:00</updated>
  <entry>
    <id>t3_aaa</id>
    <title>Atom post</title>
    <updated>2024-05-01T10:00:00+00:00</updated>
    <content type="html">body text</content>
  </entry>
  <entry>
    <id>t3_bbb</id>
    <title>Summary only</title>
    <updated>2024-05-01T10:00:00+00:00</updated>
    <summary>the summary</summary>
  </entry>
</feed>"#;

    #[test]
    fn rss_prefers_content_over_description() {
        let entries = parse_syndication(RSS_DOC.as_bytes()).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], FeedEntry::new("First", "<p>full content</p>"));
        assert_eq!(entries[1], FeedEntry::new("Second", "only a description"));
        assert_eq!(entries[2], FeedEntry::new("", "untitled"));
    }

    #[test]
    fn atom_feed_is_parsed_when_not_rss() {
        let entries = parse_syndication(ATOM_DOC.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], FeedEntry::new("Atom post", "body text"));
        assert_eq!(entries[1], FeedEntry::new("Summary only", "the summary"));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_syndication(b"not a feed").is_err());
    }

    #[test]
    fn listing_uses_selftext_with_empty_default() {
        let doc = r#"{
            "kind": "Listing",
            "data": {
                "after": null,
                "children": [
                    {"kind": "t3", "data": {"title": "A", "selftext": "x", "score": 10}},
                    {"kind": "t3", "data": {"title": "Link post", "selftext": null}},
                    {"kind": "t3", "data": {"title": "No body"}}
                ]
            }
        }"#;
        let entries = parse_listing(doc.as_bytes()).unwrap();
        assert_eq!(
            entries,
            vec![
                FeedEntry::new("A", "x"),
                FeedEntry::new("Link post", ""),
                FeedEntry::new("No body", ""),
            ]
        );
    }

    #[test]
    fn empty_listing_has_no_entries() {
        let doc = r#"{"kind": "Listing", "data": {"children": []}}"#;
        assert!(parse_listing(doc.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn listing_rejects_non_listing_json() {
        assert!(parse_listing(br#"{"message": "Not Found", "error": 404}"#).is_err());
    }

    #[test]
    fn subreddit_names_are_normalized() {
        assert_eq!(normalize_subreddit("rust").unwrap(), "rust");
        assert_eq!(normalize_subreddit(" r/rust ").unwrap(), "rust");
        assert_eq!(normalize_subreddit("/r/Ask_Science/").unwrap(), "Ask_Science");
        assert_eq!(normalize_subreddit("R/rust/").unwrap(), "rust");
        for empty in ["", "r/", "/r/", "R/", " /r// "] {
            assert!(
                matches!(normalize_subreddit(empty), Err(AppError::InvalidInput(_))),
                "{empty:?} should be rejected"
            );
        }
        assert!(normalize_subreddit("rust/../admin").is_err());
    }

    #[test]
    fn urls_follow_source_shape() {
        assert_eq!(
            subreddit_url(DEFAULT_FEED_HOST, "rust", FeedSource::Rss).unwrap(),
            "https://www.reddit.com/r/rust.rss"
        );
        assert_eq!(
            subreddit_url(DEFAULT_FEED_HOST, "r/rust", FeedSource::Json).unwrap(),
            "https://www.reddit.com/r/rust.json?sort=top&t=week"
        );
        assert_eq!(
            subreddit_url("https://old.reddit.com/", "rust", FeedSource::Rss).unwrap(),
            "https://old.reddit.com/r/rust.rss"
        );
    }

    #[test]
    fn empty_feed_is_an_error() {
        let url = "https://www.reddit.com/r/rust.json?sort=top&t=week";
        match entries_from(FeedSource::Json, url, br#"{"data": {"children": []}}"#) {
            Err(AppError::EmptyFeed { source_url }) => assert_eq!(source_url, url),
            other => panic!("expected empty feed, got {other:?}"),
        }

        let empty_channel = br#"<rss version="2.0"><channel><title>t</title></channel></rss>"#;
        assert!(matches!(
            entries_from(FeedSource::Rss, url, empty_channel),
            Err(AppError::EmptyFeed { .. })
        ));
    }

    #[test]
    fn unparseable_document_is_a_fetch_failure() {
        assert!(matches!(
            entries_from(FeedSource::Json, "u", b"<html>blocked</html>"),
            Err(AppError::FetchFailure { .. })
        ));
        assert!(matches!(
            entries_from(FeedSource::Rss, "u", b"{}"),
            Err(AppError::FetchFailure { .. })
        ));
    }

    /// Serves one canned HTTP response and hands back the raw request.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (host, handle)
    }

    #[tokio::test]
    async fn fetch_sends_browser_user_agent_and_reports_empty_feed() {
        let (host, server) = serve_once("200 OK", r#"{"data": {"children": []}}"#).await;
        let reader =
            FeedReader::for_subreddit(&host, "rust", FeedSource::Json, Duration::from_secs(5))
                .unwrap();

        let result = reader.fetch_entries().await;
        assert!(matches!(result, Err(AppError::EmptyFeed { .. })));

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /r/rust.json?sort=top&t=week "));
        assert!(USER_AGENTS
            .iter()
            .any(|ua| request.contains(&format!("user-agent: {}", ua.to_lowercase()))));
    }

    #[tokio::test]
    async fn fetch_returns_listing_entries() {
        let (host, server) = serve_once(
            "200 OK",
            r#"{"data": {"children": [{"data": {"title": "A", "selftext": "x"}}]}}"#,
        )
        .await;
        let reader =
            FeedReader::for_subreddit(&host, "rust", FeedSource::Json, Duration::from_secs(5))
                .unwrap();

        assert_eq!(
            reader.fetch_entries().await.unwrap(),
            vec![FeedEntry::new("A", "x")]
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn error_status_is_a_fetch_failure() {
        let (host, server) = serve_once("503 Service Unavailable", "{}").await;
        let reader =
            FeedReader::for_subreddit(&host, "rust", FeedSource::Rss, Duration::from_secs(5))
                .unwrap();

        match reader.fetch_entries().await {
            Err(AppError::FetchFailure { reason, .. }) => assert!(reason.contains("503")),
            other => panic!("expected fetch failure, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[test]
    fn user_agent_comes_from_pool() {
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&random_user_agent()));
        }
    }
}
