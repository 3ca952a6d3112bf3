//! Discovery of media records from course content.
//!
//! The [`Scraper`] trait is the seam between discovery and the core: any
//! implementation (the HTTP outline walker here, or a browser-driven one)
//! feeds the same [`DiscoveryCollector`], and the rest of the pipeline never
//! depends on which strategy produced a record.

mod extract;
mod outline;

use async_trait::async_trait;
use url::Url;

use crate::collector::DiscoveryCollector;
use crate::error::Error;
use crate::parser::CourseRef;

pub use extract::sanitize_component;
pub use outline::OutlineScraper;

/// A discovery strategy that feeds candidates into the collector.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Scrapes one course, recording candidates and negative pages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthorized`] when the course's outline has no
    /// content for this session, or a request error when the platform
    /// cannot be reached.
    async fn scrape_course(
        &self,
        course: &CourseRef,
        collector: &mut DiscoveryCollector,
    ) -> Result<(), Error>;
}

/// Instance-scoped endpoint configuration for one platform deployment.
///
/// All endpoints derive from a single base URL, so tests and alternate
/// deployments swap the whole surface by constructing with a different base.
#[derive(Debug, Clone)]
pub struct PlatformUrls {
    base: Url,
}

impl PlatformUrls {
    /// Creates the URL set for a platform rooted at `base`.
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Course outline endpoint for a course slug.
    #[must_use]
    pub fn outline_url(&self, slug: &str) -> String {
        format!("{}/api/course_home/v1/outline/{slug}", self.root())
    }

    /// Rendered unit page for a block identifier.
    #[must_use]
    pub fn unit_url(&self, block_id: &str) -> String {
        format!("{}/xblock/{block_id}", self.root())
    }

    /// Resolves a possibly root-relative href against the base URL.
    #[must_use]
    pub fn absolutize(&self, href: &str) -> String {
        match self.base.join(href) {
            Ok(url) => url.to_string(),
            Err(_) => href.to_string(),
        }
    }

    fn root(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }
}
