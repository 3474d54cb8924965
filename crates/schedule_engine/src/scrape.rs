use std::collections::HashSet;
use std::sync::Arc;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use percent_encoding::percent_decode_str;
use schedule_core::Terminal;
use schedule_logging::{tracker_debug, tracker_info};
use scraper::{Html, Selector};
use url::Url;

use crate::{DecodedHtml, FailureKind, FetchError, Fetcher};

/// Candidate discovery for one terminal.
#[async_trait::async_trait]
pub trait PageScraper: Send + Sync {
    /// Absolute PDF URLs on the terminal's page, in markup order.
    async fn discover(&self, terminal: &Terminal) -> Result<Vec<String>, FetchError>;
}

pub struct HtmlPageScraper {
    fetcher: Arc<dyn Fetcher>,
}

impl HtmlPageScraper {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait::async_trait]
impl PageScraper for HtmlPageScraper {
    async fn discover(&self, terminal: &Terminal) -> Result<Vec<String>, FetchError> {
        tracker_info!("Downloading {} page.", terminal.name);
        let output = self.fetcher.fetch(&terminal.source_page_url).await?;
        let decoded = decode_html(&output.bytes, output.metadata.content_type.as_deref())?;
        tracker_debug!(
            "Decoded {} page as {}",
            terminal.name,
            decoded.encoding_label
        );
        Ok(extract_pdf_links(&decoded.html, &output.metadata.final_url))
    }
}

/// Decode a page into UTF-8: BOM, then `Content-Type` charset, then detection.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedHtml, FetchError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(label) = content_type.and_then(extract_charset) {
        if let Some(enc) = Encoding::for_label(label.as_bytes()) {
            return decode_with(bytes, enc);
        }
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    decode_with(bytes, enc)
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim_matches([' ', '"', '\'']).to_string())
    })
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> Result<DecodedHtml, FetchError> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors {
        return Err(FetchError::new(
            FailureKind::Decode,
            format!("failed to decode page as {}", enc.name()),
        ));
    }
    Ok(DecodedHtml {
        html: text.into_owned(),
        encoding_label: enc.name().to_string(),
    })
}

/// Every `<a href>` whose path ends in `.pdf`, resolved against `base_url`.
///
/// Only http(s) links are kept. Duplicates are dropped, keeping the first.
pub fn extract_pdf_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let base = Url::parse(base_url).ok();
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_url(href, base.as_ref()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        if !url.path().to_ascii_lowercase().ends_with(".pdf") {
            continue;
        }
        let url = url.to_string();
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }

    links
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.and_then(|base| base.join(trimmed).ok())
}

/// Last path segment of `url`, percent-decoded; empty unless it is a `.pdf`.
pub fn advertised_filename(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    let path = percent_decode_str(parsed.path()).decode_utf8_lossy();
    let name = path.rsplit('/').next().unwrap_or_default();
    if name.to_ascii_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        String::new()
    }
}
