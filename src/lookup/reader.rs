use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{LookupConfig, LookupError, download};

/// Fetch one document page and extract the plain text of its reading pane.
///
/// The portal renders the document body inside `div#tab1`. The fetch carries
/// a Referer pointing at the search page alongside the browser identity; the
/// portal serves degraded markup without them.
pub async fn read_document(
    client: &Client,
    config: &LookupConfig,
    url: &str,
) -> Result<String, LookupError> {
    let referer = config.search_page()?;
    let html = download(client, url, Some(referer.as_str()), config.request_timeout).await?;

    match extract_body_text(&html) {
        Some(text) => {
            debug!(url, chars = text.len(), "document body extracted");
            Ok(text)
        }
        None => Err(LookupError::BodyMissing),
    }
}

/// Visible text of the `tab1` reading pane, or `None` when the pane is
/// absent (portal redesign, error interstitial, non-document page).
fn extract_body_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let pane_selector = Selector::parse("div#tab1").unwrap();
    let pane = document.select(&pane_selector).next()?;

    let mut text = String::new();
    push_visible_text(pane, &mut text);
    Some(text)
}

/// Collect text nodes with inter-element whitespace collapsed to single
/// spaces, skipping script/style subtrees whose text is never visible.
fn push_visible_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            for word in text.split_whitespace() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(word);
            }
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if matches!(child_element.value().name(), "script" | "style" | "noscript") {
                continue;
            }
            push_visible_text(child_element, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn collapses_whitespace_and_strips_markup() {
        let html = r#"<html><body><div id="tab1">  Hello <b>World</b> </div></body></html>"#;
        assert_eq!(extract_body_text(html), Some("Hello World".to_string()));
    }

    #[test]
    fn joins_nested_block_text_with_single_spaces() {
        let html = r#"
            <div id="tab1">
                <h1>LUẬT ĐẤT ĐAI</h1>
                <p>Điều 1.   Phạm vi
                điều chỉnh</p>
                <p>Điều 2. <span>Đối tượng</span> áp dụng</p>
            </div>"#;
        assert_eq!(
            extract_body_text(html),
            Some("LUẬT ĐẤT ĐAI Điều 1. Phạm vi điều chỉnh Điều 2. Đối tượng áp dụng".to_string())
        );
    }

    #[test]
    fn excludes_script_and_style_content() {
        let html = r#"
            <div id="tab1">
                <style>.x { color: red }</style>
                Before
                <script>var tracking = true;</script>
                After
            </div>"#;
        assert_eq!(extract_body_text(html), Some("Before After".to_string()));
    }

    #[test]
    fn missing_pane_yields_none() {
        let html = "<html><body><div id=\"tab2\">wrong pane</div></body></html>";
        assert_eq!(extract_body_text(html), None);
    }

    #[test]
    fn empty_pane_yields_empty_text_not_none() {
        let html = "<html><body><div id=\"tab1\">   </div></body></html>";
        assert_eq!(extract_body_text(html), Some(String::new()));
    }

    #[tokio::test]
    async fn sends_referer_and_browser_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/van-ban/doc.aspx"))
            .and(header_exists("Referer"))
            // `header` exact matching splits request values on commas, which the
            // browser UA contains; an anchored regex checks the raw value instead.
            .and(header_regex(
                "User-Agent",
                &format!("^{}$", regex::escape(super::super::BROWSER_USER_AGENT)),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><div id=\"tab1\">Nội dung văn bản</div></body></html>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let config = LookupConfig {
            portal_base: server.uri(),
            ..LookupConfig::default()
        };
        let text = read_document(
            &Client::new(),
            &config,
            &format!("{}/van-ban/doc.aspx", server.uri()),
        )
        .await
        .unwrap();

        assert_eq!(text, "Nội dung văn bản");
    }

    #[tokio::test]
    async fn referer_points_at_the_search_page() {
        let server = MockServer::start().await;
        let expected_referer = format!("{}/page/tim-van-ban.aspx", server.uri());
        Mock::given(method("GET"))
            .and(path("/van-ban/doc.aspx"))
            .and(header("Referer", expected_referer.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><body><div id=\"tab1\">ok</div></body></html>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let config = LookupConfig {
            portal_base: server.uri(),
            ..LookupConfig::default()
        };
        read_document(
            &Client::new(),
            &config,
            &format!("{}/van-ban/doc.aspx", server.uri()),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn non_success_status_maps_to_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/van-ban/gone.aspx"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let config = LookupConfig {
            portal_base: server.uri(),
            ..LookupConfig::default()
        };
        let result = read_document(
            &Client::new(),
            &config,
            &format!("{}/van-ban/gone.aspx", server.uri()),
        )
        .await;
        assert!(matches!(result, Err(LookupError::Status(404))));
    }

    #[tokio::test]
    async fn page_without_reading_pane_is_body_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/van-ban/odd.aspx"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><p>interstitial</p></body></html>"),
            )
            .mount(&server)
            .await;

        let config = LookupConfig {
            portal_base: server.uri(),
            ..LookupConfig::default()
        };
        let result = read_document(
            &Client::new(),
            &config,
            &format!("{}/van-ban/odd.aspx", server.uri()),
        )
        .await;
        assert!(matches!(result, Err(LookupError::BodyMissing)));
    }
}
