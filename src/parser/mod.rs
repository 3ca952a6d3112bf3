//! Course reference parsing.
//!
//! Users supply either a bare course slug (`course-v1:ORG+COURSE+RUN`) or a
//! full course URL containing one. Anything else is an invalid reference,
//! which is fatal before any transfer is attempted.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

/// Shape of a valid course slug: `course-v1:` followed by three
/// `+`-separated components. Static pattern, verified by tests.
#[allow(clippy::unwrap_used)]
static COURSE_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^course-v1:[A-Za-z0-9_.\-]+\+[A-Za-z0-9_.\-]+\+[A-Za-z0-9_.\-]+$").unwrap()
});

/// A validated course reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseRef {
    slug: String,
}

impl CourseRef {
    /// Returns the course slug, e.g. `course-v1:MITx+6.00.1x+1T2026`.
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }
}

impl fmt::Display for CourseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug)
    }
}

/// Parses a user-supplied course locator into a validated [`CourseRef`].
///
/// Accepts a bare slug, or a URL whose path contains a slug segment. The
/// slug may carry a trailing slash or `?query` tail when embedded in a URL.
///
/// # Errors
///
/// Returns [`Error::InvalidReference`] when no valid slug can be extracted.
pub fn parse_course_reference(input: &str) -> Result<CourseRef, Error> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_reference(input));
    }

    if COURSE_SLUG_RE.is_match(trimmed) {
        return Ok(CourseRef {
            slug: trimmed.to_string(),
        });
    }

    // Break the locator down on separators and look for a slug segment.
    for part in trimmed.split(['/', '?', '#']) {
        if COURSE_SLUG_RE.is_match(part) {
            return Ok(CourseRef {
                slug: part.to_string(),
            });
        }
    }

    Err(Error::invalid_reference(input))
}
