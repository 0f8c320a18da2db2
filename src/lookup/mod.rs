pub mod finder;
pub mod reader;

use std::time::Duration;

use reqwest::Client;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

/// Hard cap on downloaded page size. Law documents can be long but a
/// search or document page past this is not worth feeding to a model.
const MAX_RESPONSE_BYTES: usize = 10_000_000;

/// The portal degrades or rejects requests without a plausible browser identity.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

const DEFAULT_PORTAL: &str = "https://thuvienphapluat.vn";
const SEARCH_PATH: &str = "page/tim-van-ban.aspx";

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Network(reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("portal returned status {0}")]
    Status(u16),

    #[error("response too large (>{} bytes)", MAX_RESPONSE_BYTES)]
    TooLarge,

    #[error("document body region not found")]
    BodyMissing,

    #[error("lookup deadline exceeded")]
    Deadline,
}

impl LookupError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LookupError::Timeout
        } else {
            LookupError::Network(e)
        }
    }
}

/// Bounds for one lookup pipeline run. Defaults match the portal's ranking
/// cap (top 5) and keep an unresponsive portal from hanging the caller.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Portal origin, overridable for tests and alternate mirrors.
    pub portal_base: String,
    /// Maximum number of documents fetched per lookup.
    pub max_documents: usize,
    /// Timeout for each individual HTTP request.
    pub request_timeout: Duration,
    /// Deadline for the whole search-then-fetch pipeline.
    pub deadline: Duration,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            portal_base: DEFAULT_PORTAL.to_string(),
            max_documents: 5,
            request_timeout: Duration::from_secs(8),
            deadline: Duration::from_secs(30),
        }
    }
}

impl LookupConfig {
    fn base_url(&self) -> Result<url::Url, LookupError> {
        Ok(url::Url::parse(&self.portal_base)?)
    }

    /// The portal's search page without query parameters. Used as the
    /// Referer for document fetches; the portal branches on its absence.
    fn search_page(&self) -> Result<url::Url, LookupError> {
        Ok(self.base_url()?.join(SEARCH_PATH)?)
    }
}

/// One document's extraction result. `text` is empty on failure, with the
/// reason kept alongside so callers can tell a dead portal from a document
/// that simply has no readable body.
#[derive(Debug)]
pub struct Excerpt {
    pub url: String,
    pub text: String,
    pub failure: Option<LookupError>,
}

/// Ordered excerpts, index-aligned with the portal's result ranking.
/// Position 0 is the portal's most relevant document.
#[derive(Debug, Default)]
pub struct LookupOutcome {
    pub excerpts: Vec<Excerpt>,
    /// Set when the search itself failed; `excerpts` is empty in that case.
    pub search_failure: Option<LookupError>,
}

impl LookupOutcome {
    fn from_search_failure(e: LookupError) -> Self {
        Self {
            excerpts: Vec::new(),
            search_failure: Some(e),
        }
    }

    /// The narrow caller contract: one plain-text string per selected
    /// document, `""` where extraction failed.
    pub fn texts(&self) -> Vec<String> {
        self.excerpts.iter().map(|e| e.text.clone()).collect()
    }
}

/// Seam between the lookup pipeline and its callers (the advisor, the CLI).
/// Mock implementations stand in for the portal in tests.
pub trait LawSource {
    async fn lookup(&self, keywords: &str) -> LookupOutcome;
}

/// Portal-backed `LawSource` bundling the shared HTTP client with bounds.
#[derive(Clone)]
pub struct PortalLookup {
    http: Client,
    config: LookupConfig,
}

impl PortalLookup {
    pub fn new(http: Client, config: LookupConfig) -> Self {
        Self { http, config }
    }
}

impl LawSource for PortalLookup {
    async fn lookup(&self, keywords: &str) -> LookupOutcome {
        lookup_law(&self.http, &self.config, keywords).await
    }
}

/// Search the portal for `keywords` and read the top documents.
///
/// Never returns an error: a failed search yields an empty outcome with
/// `search_failure` set, and a failed document read yields an empty-text
/// excerpt at its position without aborting the remaining reads.
pub async fn lookup_law(client: &Client, config: &LookupConfig, keywords: &str) -> LookupOutcome {
    let deadline = Instant::now() + config.deadline;

    let references = match timeout_at(deadline, finder::find_documents(client, config, keywords))
        .await
    {
        Ok(Ok(refs)) => refs,
        Ok(Err(e)) => {
            warn!(keywords, error = %e, "document search failed");
            return LookupOutcome::from_search_failure(e);
        }
        Err(_) => {
            warn!(keywords, "document search exceeded the lookup deadline");
            return LookupOutcome::from_search_failure(LookupError::Deadline);
        }
    };

    let mut excerpts = Vec::new();
    for url in references.into_iter().take(config.max_documents) {
        let excerpt = match timeout_at(deadline, reader::read_document(client, config, &url)).await
        {
            Ok(Ok(text)) => Excerpt {
                url,
                text,
                failure: None,
            },
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "document read failed");
                Excerpt {
                    url,
                    text: String::new(),
                    failure: Some(e),
                }
            }
            Err(_) => {
                warn!(url = %url, "document read exceeded the lookup deadline");
                Excerpt {
                    url,
                    text: String::new(),
                    failure: Some(LookupError::Deadline),
                }
            }
        };
        excerpts.push(excerpt);
    }

    debug!(
        keywords,
        documents = excerpts.len(),
        failed = excerpts.iter().filter(|e| e.failure.is_some()).count(),
        "lookup complete"
    );

    LookupOutcome {
        excerpts,
        search_failure: None,
    }
}

/// GET a portal page with browser-like headers and return its body as text.
async fn download(
    client: &Client,
    url: &str,
    referer: Option<&str>,
    timeout: Duration,
) -> Result<String, LookupError> {
    let mut request = client
        .get(url)
        .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
        .timeout(timeout);
    if let Some(referer) = referer {
        request = request.header(reqwest::header::REFERER, referer);
    }

    let response = request.send().await.map_err(LookupError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(LookupError::Status(status.as_u16()));
    }

    if let Some(len) = response.content_length()
        && len as usize > MAX_RESPONSE_BYTES
    {
        return Err(LookupError::TooLarge);
    }

    let mut body = Vec::new();
    let mut stream = response;
    while let Some(chunk) = stream.chunk().await.map_err(LookupError::from_reqwest)? {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(LookupError::TooLarge);
        }
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}
