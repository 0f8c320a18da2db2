mod advisor;
mod gemini;
mod lookup;

pub const USER_AGENT: &str = concat!("tracuu/", env!("CARGO_PKG_VERSION"));

use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Client;
use tracing::info;

use advisor::Advisor;
use gemini::client::GeminiClient;
use lookup::{LookupConfig, PortalLookup, lookup_law};

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout covering DNS + connect + response body.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum redirect hops before aborting.
const MAX_REDIRECTS: usize = 5;

const EXCERPT_PREVIEW_CHARS: usize = 2000;

#[derive(Parser)]
#[command(name = "tracuu", version, about = "Tra cứu văn bản pháp luật và hỏi đáp luật thuế Việt Nam")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Portal origin hosting the legal documents
    #[arg(long, global = true, default_value = "https://thuvienphapluat.vn")]
    portal: String,

    /// Maximum number of documents fetched per lookup
    #[arg(long, global = true, default_value_t = 5)]
    limit: usize,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = 8)]
    timeout: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Search the portal and print the extracted document texts
    Lookup {
        /// Search keywords, passed to the portal as-is
        keywords: String,
    },
    /// Ask a tax-law question; the model looks up documents as needed
    Ask {
        /// The question, in Vietnamese
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tracuu=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let http = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;

    let config = LookupConfig {
        portal_base: cli.portal,
        max_documents: cli.limit,
        request_timeout: Duration::from_secs(cli.timeout),
        ..LookupConfig::default()
    };

    match cli.command {
        Command::Lookup { keywords } => run_lookup(&http, &config, &keywords).await,
        Command::Ask { question } => run_ask(http, config, &question).await,
    }
}

async fn run_lookup(
    http: &Client,
    config: &LookupConfig,
    keywords: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(keywords, "looking up documents");
    let outcome = lookup_law(http, config, keywords).await;

    if let Some(reason) = &outcome.search_failure {
        println!("Tìm kiếm thất bại: {reason}");
        return Ok(());
    }
    if outcome.excerpts.is_empty() {
        println!("Không tìm thấy văn bản nào cho từ khóa \"{keywords}\".");
        return Ok(());
    }

    for (i, excerpt) in outcome.excerpts.iter().enumerate() {
        println!("--- [{}] {}", i + 1, excerpt.url);
        match &excerpt.failure {
            Some(reason) => println!("(không đọc được: {reason})"),
            None => println!("{}", preview(&excerpt.text)),
        }
        println!();
    }
    Ok(())
}

async fn run_ask(
    http: Client,
    config: LookupConfig,
    question: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let gemini = GeminiClient::from_env(http.clone())?;
    let advisor = Advisor::new(gemini, PortalLookup::new(http, config));

    match advisor.answer(question).await {
        Ok(answer) => {
            println!("{}", answer.text);
            if !answer.lookups.is_empty() {
                println!();
                for record in &answer.lookups {
                    println!(
                        "(đã tra cứu \"{}\" — {} văn bản)",
                        record.keywords, record.documents
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            println!("Xin lỗi, đã có lỗi xảy ra: {e}");
            std::process::exit(1);
        }
    }
}

/// Bound terminal output per document; law texts run to hundreds of pages.
fn preview(text: &str) -> &str {
    if text.len() <= EXCERPT_PREVIEW_CHARS {
        return text;
    }
    let mut end = EXCERPT_PREVIEW_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
