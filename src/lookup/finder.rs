use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use super::{LookupConfig, LookupError, download};

/// Search the portal for `keywords` and return the document URLs of every
/// titled result, in the portal's own ranking order.
///
/// The keyword string is passed through as-is into the query parameter; the
/// portal does its own matching (`match=True`, all subject areas). URLs are
/// not deduplicated or validated — a reference is only proven reachable when
/// the reader attempts it.
pub async fn find_documents(
    client: &Client,
    config: &LookupConfig,
    keywords: &str,
) -> Result<Vec<String>, LookupError> {
    // Same page the reader later names in its Referer; built in one place
    // so the two cannot drift apart.
    let mut search_url = config.search_page()?;
    search_url
        .query_pairs_mut()
        .append_pair("keyword", keywords)
        .append_pair("match", "True")
        .append_pair("area", "0");

    let html = download(client, search_url.as_str(), None, config.request_timeout).await?;

    let references = extract_references(&html, &config.base_url()?);
    debug!(keywords, found = references.len(), "portal search parsed");
    Ok(references)
}

/// Pull document links out of a search result page.
///
/// A result entry is a `<p class="nqTitle" lawid="...">` block; its first
/// `<a href>` is the document link. Blocks without a link are skipped.
/// Markup that matches nothing yields an empty list, not an error — the
/// portal redesigning its result page must degrade to "no results".
fn extract_references(html: &str, base: &url::Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let entry_selector = Selector::parse("p.nqTitle[lawid]").unwrap();
    let link_selector = Selector::parse("a[href]").unwrap();

    let mut references = Vec::new();
    for entry in document.select(&entry_selector) {
        let Some(link) = entry.select(&link_selector).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        // Portal hrefs are usually absolute already; join handles both.
        let Ok(resolved) = base.join(href.trim()) else {
            continue;
        };
        references.push(resolved.to_string());
    }
    references
}
