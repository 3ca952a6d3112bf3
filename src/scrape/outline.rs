//! Outline-driven HTTP scraper.
//!
//! Walks a course's outline manifest (chapters → sequentials), fetches each
//! lecture's rendered unit page, and turns embedded player metadata into
//! [`DiscoveredMedia`] candidates for the collector.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tracing::{debug, info, warn};

use super::extract::{
    extract_article, extract_segment_title, extract_video_metadata, sanitize_component,
};
use super::{PlatformUrls, Scraper};
use crate::collector::{DiscoveredMedia, DiscoveryCollector};
use crate::error::Error;
use crate::parser::CourseRef;
use crate::transfer::SessionClient;

/// Attempts for fetching one unit page.
const UNIT_FETCH_ATTEMPTS: u32 = 3;

/// Delay between unit page fetch attempts.
const UNIT_FETCH_DELAY: Duration = Duration::from_secs(2);

/// Segment name used when the unit page carries no iframe title.
const DEFAULT_SEGMENT: &str = "video";

#[derive(Debug, Deserialize)]
struct OutlineResponse {
    #[serde(default)]
    course_blocks: Option<CourseBlocks>,
}

#[derive(Debug, Deserialize)]
struct CourseBlocks {
    #[serde(default)]
    blocks: HashMap<String, BlockMeta>,
}

#[derive(Debug, Clone, Deserialize)]
struct BlockMeta {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    children: Option<Vec<String>>,
}

/// Default [`Scraper`] implementation over the platform's HTTP surface.
pub struct OutlineScraper {
    client: SessionClient,
    urls: PlatformUrls,
    output_root: PathBuf,
    export_documents: bool,
}

impl OutlineScraper {
    /// Creates a scraper writing output paths under `output_root`.
    #[must_use]
    pub fn new(client: SessionClient, urls: PlatformUrls, output_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            urls,
            output_root: output_root.into(),
            export_documents: true,
        }
    }

    /// Enables or disables auxiliary document export for text lectures.
    #[must_use]
    pub fn with_document_export(mut self, export_documents: bool) -> Self {
        self.export_documents = export_documents;
        self
    }

    /// Fetches a unit page with a bounded retry loop.
    async fn fetch_unit(&self, url: &str) -> Result<String, Error> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.client.get_text(url).await {
                Ok(html) => return Ok(html),
                Err(e) if attempt < UNIT_FETCH_ATTEMPTS => {
                    warn!(url = %url, attempt, error = %e, "unit page fetch failed, retrying");
                    tokio::time::sleep(UNIT_FETCH_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn scrape_lecture(
        &self,
        lecture_id: &str,
        lecture: &BlockMeta,
        course_title: &str,
        chapter_title: &str,
        chapter_dir: &Path,
        collector: &mut DiscoveryCollector,
    ) -> Result<(), Error> {
        let unit_url = self.urls.unit_url(lecture_id);
        let html = self.fetch_unit(&unit_url).await?;

        let lecture_title = lecture.display_name.clone().unwrap_or_default();
        let segment = extract_segment_title(&html)
            .map(|title| sanitize_component(&title))
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| DEFAULT_SEGMENT.to_string());
        let base_filename = format!("{segment} - {}", sanitize_component(&lecture_title));

        if self.export_documents && !collector.is_rendered(lecture_id) {
            self.export_document(lecture_id, &html, chapter_dir, &base_filename, collector)
                .await;
        }

        let mut candidate = DiscoveredMedia {
            id: lecture_id.to_string(),
            course: course_title.to_string(),
            chapter: chapter_title.to_string(),
            lecture: lecture_title,
            segment,
            video_url: None,
            subtitle_url: None,
            base_directory: chapter_dir.to_path_buf(),
            base_filename,
        };

        for metadata in extract_video_metadata(&html) {
            if let Some(mp4) = metadata.first_mp4() {
                candidate.video_url = Some(mp4.to_string());
                candidate.subtitle_url = metadata
                    .transcript_download_path()
                    .map(|path| self.urls.absolutize(&path));
                break;
            }
        }

        let has_subtitle = candidate.subtitle_url.is_some();
        if collector.record(candidate) {
            info!(
                lecture = %lecture_id,
                subtitle = has_subtitle,
                "video found"
            );
        } else {
            debug!(lecture = %lecture_id, "no video in unit page");
        }
        Ok(())
    }

    /// Writes text-lecture content next to the media files. Best effort: a
    /// failed export is logged and never aborts the course.
    async fn export_document(
        &self,
        lecture_id: &str,
        html: &str,
        chapter_dir: &Path,
        base_filename: &str,
        collector: &mut DiscoveryCollector,
    ) {
        let Some(article) = extract_article(html, self.urls.base()) else {
            return;
        };

        let path = chapter_dir.join(format!("{base_filename}.html"));
        if fs::metadata(&path).await.is_ok() {
            collector.mark_rendered(lecture_id);
            return;
        }

        let written = match fs::create_dir_all(chapter_dir).await {
            Ok(()) => fs::write(&path, article).await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => {
                info!(path = %path.display(), "text lecture exported");
                collector.mark_rendered(lecture_id);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "document export failed"),
        }
    }
}

#[async_trait]
impl Scraper for OutlineScraper {
    async fn scrape_course(
        &self,
        course: &CourseRef,
        collector: &mut DiscoveryCollector,
    ) -> Result<(), Error> {
        let outline_url = self.urls.outline_url(course.slug());
        info!(course = %course, "fetching course outline");

        let outline: OutlineResponse = self.client.get_json(&outline_url).await?;
        let Some(blocks) = outline
            .course_blocks
            .map(|course_blocks| course_blocks.blocks)
            .filter(|blocks| !blocks.is_empty())
        else {
            return Err(Error::not_authorized(course.slug()));
        };

        let course_root = blocks.values().find(|block| block.kind == "course");
        let course_title = course_root
            .and_then(|block| block.display_name.clone())
            .unwrap_or_else(|| course.slug().to_string());
        let course_dir = self.output_root.join(sanitize_component(&course_title));

        // The outline's children arrays carry the display order; the blocks
        // map itself does not.
        let chapter_ids = ordered_chapter_ids(&blocks, course_root);

        let mut lectures = 0usize;
        for chapter_id in chapter_ids {
            let Some(chapter) = blocks.get(&chapter_id) else {
                continue;
            };
            let Some(children) = &chapter.children else {
                continue;
            };
            let chapter_title = chapter.display_name.clone().unwrap_or_default();
            let chapter_dir = course_dir.join(sanitize_component(&chapter_title));

            for lecture_id in children {
                let Some(lecture) = blocks.get(lecture_id) else {
                    continue;
                };
                if lecture.kind != "sequential" {
                    continue;
                }
                if collector.already_classified(lecture_id) {
                    debug!(lecture = %lecture_id, "already classified, skipping");
                    continue;
                }
                self.scrape_lecture(
                    lecture_id,
                    lecture,
                    &course_title,
                    &chapter_title,
                    &chapter_dir,
                    collector,
                )
                .await?;
                lectures += 1;
            }
        }

        info!(course = %course, lectures, "course scrape complete");
        Ok(())
    }
}

/// Chapter ids in display order: the course root's children when present,
/// otherwise every chapter block sorted by id for a stable fallback.
fn ordered_chapter_ids(
    blocks: &HashMap<String, BlockMeta>,
    course_root: Option<&BlockMeta>,
) -> Vec<String> {
    if let Some(children) = course_root.and_then(|root| root.children.as_ref()) {
        return children
            .iter()
            .filter(|id| blocks.get(*id).is_some_and(|block| block.kind == "chapter"))
            .cloned()
            .collect();
    }

    let mut ids: Vec<String> = blocks
        .iter()
        .filter(|(_, block)| block.kind == "chapter")
        .map(|(id, _)| id.clone())
        .collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn block(kind: &str, name: &str, children: Option<Vec<&str>>) -> BlockMeta {
        BlockMeta {
            kind: kind.to_string(),
            display_name: Some(name.to_string()),
            children: children.map(|ids| ids.into_iter().map(ToString::to_string).collect()),
        }
    }

    #[test]
    fn test_outline_response_tolerates_missing_course_blocks() {
        let outline: OutlineResponse = serde_json::from_str("{}").unwrap();
        assert!(outline.course_blocks.is_none());
    }

    #[test]
    fn test_outline_response_parses_blocks() {
        let payload = r#"{
            "course_blocks": {
                "blocks": {
                    "root": {"type": "course", "display_name": "Course", "children": ["ch1"]},
                    "ch1": {"type": "chapter", "display_name": "Week 1", "children": ["seq1"]},
                    "seq1": {"type": "sequential", "display_name": "Intro"}
                }
            }
        }"#;
        let outline: OutlineResponse = serde_json::from_str(payload).unwrap();
        let blocks = outline.course_blocks.unwrap().blocks;
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks["seq1"].kind, "sequential");
        assert_eq!(blocks["seq1"].children, None);
    }

    #[test]
    fn test_ordered_chapter_ids_follow_course_children() {
        let mut blocks = HashMap::new();
        blocks.insert("root".to_string(), block("course", "C", Some(vec!["b", "a"])));
        blocks.insert("a".to_string(), block("chapter", "A", Some(vec![])));
        blocks.insert("b".to_string(), block("chapter", "B", Some(vec![])));

        let ids = ordered_chapter_ids(&blocks, blocks.get("root"));
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_ordered_chapter_ids_fallback_is_sorted() {
        let mut blocks = HashMap::new();
        blocks.insert("z".to_string(), block("chapter", "Z", None));
        blocks.insert("a".to_string(), block("chapter", "A", None));
        blocks.insert("v".to_string(), block("vertical", "V", None));

        let ids = ordered_chapter_ids(&blocks, None);
        assert_eq!(ids, vec!["a".to_string(), "z".to_string()]);
    }
}
