//! Markup extraction for unit pages.
//!
//! Unit pages embed their player configuration as an HTML-escaped JSON blob
//! in a `data-metadata` attribute. Extraction here is deliberately shallow
//! regex work over that blob and a couple of well-known attributes; it is
//! tied to the platform's current markup and kept out of the core.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use url::Url;

// Static patterns, verified by tests.
#[allow(clippy::unwrap_used)]
static SANITIZE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w ]+").unwrap());

#[allow(clippy::unwrap_used)]
static METADATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-metadata=(?:"([^"]*)"|'([^']*)')"#).unwrap());

#[allow(clippy::unwrap_used)]
static IFRAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<iframe\b[^>]*>").unwrap());

#[allow(clippy::unwrap_used)]
static TITLE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\btitle="([^"]*)""#).unwrap());

/// Player configuration pulled from one `data-metadata` attribute.
#[derive(Debug, Deserialize)]
pub(crate) struct VideoMetadata {
    /// Candidate media URLs, usually one per encoding.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Transcript translations endpoint, when the unit has subtitles.
    #[serde(rename = "transcriptAvailableTranslationsUrl", default)]
    pub transcript_available_translations_url: Option<String>,
}

impl VideoMetadata {
    /// Returns the first direct `.mp4` source, if any.
    pub(crate) fn first_mp4(&self) -> Option<&str> {
        self.sources
            .iter()
            .map(String::as_str)
            .find(|source| source.ends_with(".mp4"))
    }

    /// Derives the transcript download path from the translations endpoint.
    pub(crate) fn transcript_download_path(&self) -> Option<String> {
        self.transcript_available_translations_url
            .as_deref()
            .map(|path| path.replacen("available_translations", "download", 1))
    }
}

/// Replaces every character outside `[\w ]` with `-`, collapsing runs.
///
/// Used for directory and file name components built from display names.
#[must_use]
pub fn sanitize_component(name: &str) -> String {
    SANITIZE_RE.replace_all(name, "-").trim().to_string()
}

/// Extracts and parses every `data-metadata` player blob on the page.
pub(crate) fn extract_video_metadata(html: &str) -> Vec<VideoMetadata> {
    let mut found = Vec::new();
    for captures in METADATA_RE.captures_iter(html) {
        let raw = captures
            .get(1)
            .or_else(|| captures.get(2))
            .map_or("", |m| m.as_str());
        let json = unescape_html(raw);
        match serde_json::from_str::<VideoMetadata>(&json) {
            Ok(metadata) => found.push(metadata),
            Err(e) => debug!(error = %e, "skipping unparseable data-metadata blob"),
        }
    }
    found
}

/// Returns the unit iframe's title, the segment name on the platform.
pub(crate) fn extract_segment_title(html: &str) -> Option<String> {
    IFRAME_RE
        .find_iter(html)
        .map(|m| m.as_str())
        .find(|tag| tag.contains("unit-iframe"))
        .and_then(|tag| TITLE_ATTR_RE.captures(tag))
        .map(|captures| unescape_html(&captures[1]))
}

/// Extracts text-lecture content for export as an auxiliary document.
///
/// Best-effort slice: unit pages are small fragments, so everything from the
/// student-view container onward is taken when the unit carries paragraph
/// content. Root-relative asset URLs are rewritten against the platform base
/// so the exported document renders standalone.
pub(crate) fn extract_article(html: &str, base: &Url) -> Option<String> {
    let start = html.find("xblock-student_view")?;
    let opening = html[..start].rfind('<')?;
    let fragment = &html[opening..];
    if !fragment.contains("<p") {
        return None;
    }

    let origin = base.as_str().trim_end_matches('/');
    Some(fragment.replace("src=\"/", &format!("src=\"{origin}/")))
}

/// Decodes the HTML entities the platform uses when escaping attributes.
fn unescape_html(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const UNIT_HTML: &str = r#"
        <div class="unit-wrapper">
          <iframe id="unit-iframe" title="Welcome to Week 1!" src="about:blank"></iframe>
          <div class="xblock-student_view">
            <div class="video" data-metadata="{&quot;sources&quot;: [&quot;https://cdn.example.com/v/abc.webm&quot;, &quot;https://cdn.example.com/v/abc.mp4&quot;], &quot;transcriptAvailableTranslationsUrl&quot;: &quot;/courses/x/handler/transcript/available_translations&quot;}"></div>
          </div>
        </div>
    "#;

    #[test]
    fn test_sanitize_component_replaces_punctuation() {
        assert_eq!(
            sanitize_component("Lecture 2: Loops & Arrays / Slices"),
            "Lecture 2- Loops - Arrays - Slices"
        );
    }

    #[test]
    fn test_sanitize_component_keeps_word_characters() {
        assert_eq!(sanitize_component("plain_name 42"), "plain_name 42");
    }

    #[test]
    fn test_extract_video_metadata_parses_escaped_json() {
        let metadata = extract_video_metadata(UNIT_HTML);
        assert_eq!(metadata.len(), 1);
        assert_eq!(
            metadata[0].first_mp4(),
            Some("https://cdn.example.com/v/abc.mp4")
        );
    }

    #[test]
    fn test_transcript_download_path_derivation() {
        let metadata = extract_video_metadata(UNIT_HTML);
        assert_eq!(
            metadata[0].transcript_download_path().as_deref(),
            Some("/courses/x/handler/transcript/download")
        );
    }

    #[test]
    fn test_extract_video_metadata_skips_unparseable_blob() {
        let html = r#"<div data-metadata="not json"></div>"#;
        assert!(extract_video_metadata(html).is_empty());
    }

    #[test]
    fn test_extract_video_metadata_single_quoted_attribute() {
        let html = r"<div data-metadata='{&quot;sources&quot;: [&quot;https://cdn.example.com/b.mp4&quot;]}'></div>";
        let metadata = extract_video_metadata(html);
        assert_eq!(metadata.len(), 1);
        assert_eq!(
            metadata[0].first_mp4(),
            Some("https://cdn.example.com/b.mp4")
        );
    }

    #[test]
    fn test_extract_segment_title() {
        assert_eq!(
            extract_segment_title(UNIT_HTML).as_deref(),
            Some("Welcome to Week 1!")
        );
    }

    #[test]
    fn test_extract_segment_title_missing_iframe() {
        assert_eq!(extract_segment_title("<div>no iframe here</div>"), None);
    }

    #[test]
    fn test_extract_article_requires_paragraphs() {
        let base = Url::parse("https://courses.example.org").unwrap();
        assert!(extract_article(UNIT_HTML, &base).is_none());

        let with_text = r#"<div class="xblock-student_view"><p>Reading.</p><img src="/static/fig.png"></div>"#;
        let article = extract_article(with_text, &base).unwrap();
        assert!(article.contains("<p>Reading.</p>"));
        assert!(
            article.contains(r#"src="https://courses.example.org/static/fig.png""#),
            "got: {article}"
        );
    }
}
