//! In-memory accumulation of discovered media records.
//!
//! The [`DiscoveryCollector`] receives candidate records from the scraping
//! layer, deduplicates by block identifier, and exposes the finalized
//! sequence to the transfer stage in insertion order. It also tracks the
//! negative set (pages that yielded no media) and the rendered set (pages
//! already exported as auxiliary documents), so re-runs skip pages that were
//! classified before.
//!
//! The collector owns the in-memory sets exclusively during a run; reading
//! and writing the backing files is the [`crate::store::ResultStore`]'s job.

mod record;

use std::collections::HashSet;

use tracing::debug;
use url::Url;

use crate::store::PersistedState;

pub use record::DiscoveredMedia;

/// Borrowed view of the collector's state, handed to the store for saving.
#[derive(Debug, Clone, Copy)]
pub struct StateSnapshot<'a> {
    /// Positive records, in insertion order.
    pub positives: &'a [DiscoveredMedia],
    /// Identifiers of pages with no usable media.
    pub negatives: &'a HashSet<String>,
    /// Identifiers of pages already exported as auxiliary documents.
    pub rendered: &'a HashSet<String>,
}

/// Deduplicating accumulator for discovered media records.
#[derive(Debug, Default)]
pub struct DiscoveryCollector {
    results: Vec<DiscoveredMedia>,
    positive_ids: HashSet<String>,
    negative_ids: HashSet<String>,
    rendered_ids: HashSet<String>,
}

impl DiscoveryCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the collector with state loaded from a previous run.
    ///
    /// File order is preserved for the positive sequence; duplicate
    /// identifiers within the loaded state are skipped.
    pub fn seed(&mut self, state: PersistedState) {
        for media in state.positives {
            if self.positive_ids.insert(media.id.clone()) {
                self.results.push(media);
            }
        }
        self.negative_ids.extend(state.negatives);
        self.rendered_ids.extend(state.rendered);
        debug!(
            positives = self.results.len(),
            negatives = self.negative_ids.len(),
            rendered = self.rendered_ids.len(),
            "collector seeded from persisted state"
        );
    }

    /// Records a candidate. Returns `true` if the entry was added.
    ///
    /// Returns `false` and makes no change when the entry's id is already a
    /// known positive. A candidate without a parseable `video_url` is never
    /// added; its id is marked negative instead so the page is not scraped
    /// again on later runs. A `subtitle_url` that does not parse as a URL is
    /// dropped from the entry before it is stored.
    pub fn record(&mut self, mut entry: DiscoveredMedia) -> bool {
        if self.positive_ids.contains(&entry.id) {
            return false;
        }

        let has_video = entry
            .video_url
            .as_deref()
            .is_some_and(|raw| Url::parse(raw).is_ok());
        if !has_video {
            debug!(id = %entry.id, "candidate has no usable video URL, marking negative");
            self.mark_negative(&entry.id);
            return false;
        }

        if entry
            .subtitle_url
            .as_deref()
            .is_some_and(|raw| Url::parse(raw).is_err())
        {
            entry.subtitle_url = None;
        }

        self.positive_ids.insert(entry.id.clone());
        self.results.push(entry);
        true
    }

    /// Marks a page identifier as yielding no media. Idempotent.
    pub fn mark_negative(&mut self, id: &str) {
        self.negative_ids.insert(id.to_string());
    }

    /// Marks a page identifier as exported to an auxiliary document. Idempotent.
    pub fn mark_rendered(&mut self, id: &str) {
        self.rendered_ids.insert(id.to_string());
    }

    /// Returns whether the page was already exported as a document.
    #[must_use]
    pub fn is_rendered(&self, id: &str) -> bool {
        self.rendered_ids.contains(id)
    }

    /// Returns whether the page was already classified, positively or
    /// negatively, on this or a previous run.
    #[must_use]
    pub fn already_classified(&self, id: &str) -> bool {
        self.positive_ids.contains(id) || self.negative_ids.contains(id)
    }

    /// The accumulated positive records, insertion order preserved.
    #[must_use]
    pub fn results(&self) -> &[DiscoveredMedia] {
        &self.results
    }

    /// Borrows the three sets for persistence.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot<'_> {
        StateSnapshot {
            positives: &self.results,
            negatives: &self.negative_ids,
            rendered: &self.rendered_ids,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn media(id: &str, video_url: Option<&str>) -> DiscoveredMedia {
        DiscoveredMedia {
            id: id.to_string(),
            course: "Course".to_string(),
            chapter: "Chapter".to_string(),
            lecture: "Lecture".to_string(),
            segment: "Segment".to_string(),
            video_url: video_url.map(ToString::to_string),
            subtitle_url: None,
            base_directory: PathBuf::from("/out/Course/Chapter"),
            base_filename: "Segment - Lecture".to_string(),
        }
    }

    #[test]
    fn test_record_is_idempotent_per_id() {
        let mut collector = DiscoveryCollector::new();
        let entry = media("block-1", Some("https://cdn.example.com/a.mp4"));

        assert!(collector.record(entry.clone()));
        assert!(!collector.record(entry));
        assert_eq!(collector.results().len(), 1);
    }

    #[test]
    fn test_record_without_video_url_goes_negative() {
        let mut collector = DiscoveryCollector::new();

        assert!(!collector.record(media("block-1", None)));
        assert!(collector.results().is_empty());
        assert!(collector.snapshot().negatives.contains("block-1"));
        assert!(collector.already_classified("block-1"));
    }

    #[test]
    fn test_record_with_unparseable_video_url_goes_negative() {
        let mut collector = DiscoveryCollector::new();

        assert!(!collector.record(media("block-1", Some("not a url"))));
        assert!(collector.results().is_empty());
        assert!(collector.snapshot().negatives.contains("block-1"));
    }

    #[test]
    fn test_record_drops_invalid_subtitle_url() {
        let mut collector = DiscoveryCollector::new();
        let mut entry = media("block-1", Some("https://cdn.example.com/a.mp4"));
        entry.subtitle_url = Some("::garbage::".to_string());

        assert!(collector.record(entry));
        assert_eq!(collector.results()[0].subtitle_url, None);
    }

    #[test]
    fn test_results_preserve_insertion_order() {
        let mut collector = DiscoveryCollector::new();
        for i in 0..5 {
            let id = format!("block-{i}");
            let url = format!("https://cdn.example.com/{i}.mp4");
            assert!(collector.record(media(&id, Some(&url))));
        }

        let ids: Vec<&str> = collector.results().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["block-0", "block-1", "block-2", "block-3", "block-4"]
        );
    }

    #[test]
    fn test_mark_negative_is_idempotent() {
        let mut collector = DiscoveryCollector::new();
        collector.mark_negative("block-1");
        collector.mark_negative("block-1");
        assert_eq!(collector.snapshot().negatives.len(), 1);
    }

    #[test]
    fn test_seed_deduplicates_and_preserves_order() {
        let mut collector = DiscoveryCollector::new();
        let first = media("block-1", Some("https://cdn.example.com/a.mp4"));
        let duplicate = media("block-1", Some("https://cdn.example.com/other.mp4"));
        let second = media("block-2", Some("https://cdn.example.com/b.mp4"));

        collector.seed(PersistedState {
            positives: vec![first.clone(), duplicate, second.clone()],
            negatives: vec!["block-3".to_string()],
            rendered: vec!["block-4".to_string()],
        });

        assert_eq!(collector.results(), &[first, second]);
        assert!(collector.already_classified("block-3"));
        assert!(collector.is_rendered("block-4"));
        // Seeded positives must not be re-recordable
        assert!(!collector.record(media("block-2", Some("https://cdn.example.com/b.mp4"))));
    }
}
