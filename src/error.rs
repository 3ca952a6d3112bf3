//! Crate-wide error type.
//!
//! A single discriminated error covers every failure kind the tool can hit,
//! so the top level can branch on the variant (reference shape, authorization,
//! transient request failures, local I/O) without juggling overlapping error
//! types across modules.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while scraping, persisting, or transferring media.
#[derive(Debug, Error)]
pub enum Error {
    /// The supplied course locator does not match the expected shape.
    #[error("invalid course reference: {input}")]
    InvalidReference {
        /// The locator as supplied by the user.
        input: String,
    },

    /// The outline endpoint returned no content for this course.
    #[error("no course content found for {course}: check your enrollment and access")]
    NotAuthorized {
        /// The course slug that could not be accessed.
        course: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("request to {url} failed: {source}")]
    Request {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// File system error (state files, partial files, document export).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A response was received but its payload could not be interpreted.
    #[error("unexpected response from {url}: {detail}")]
    UnexpectedResponse {
        /// The URL that answered.
        url: String,
        /// What was wrong with the payload.
        detail: String,
    },

    /// The subtitle format selection request never succeeded.
    #[error("subtitle format selection failed for {url} after {attempts} attempts")]
    SubtitleFormat {
        /// The format selection endpoint.
        url: String,
        /// How many attempts were made.
        attempts: u32,
    },

    /// The cookie file could not be used to build a session.
    #[error("cookie file {path}: {reason}")]
    Cookie {
        /// Path of the cookie file.
        path: PathBuf,
        /// Description of what was wrong.
        reason: String,
    },

    /// The home directory could not be determined for state files.
    #[error("could not determine home directory for state files")]
    NoHomeDir,
}

impl Error {
    /// Creates an invalid reference error.
    pub fn invalid_reference(input: impl Into<String>) -> Self {
        Self::InvalidReference {
            input: input.into(),
        }
    }

    /// Creates a not-authorized error for a course.
    pub fn not_authorized(course: impl Into<String>) -> Self {
        Self::NotAuthorized {
            course: course.into(),
        }
    }

    /// Creates a request error from a reqwest error, mapping timeouts to
    /// their own variant.
    pub fn request(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Request { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an unexpected-response error.
    pub fn unexpected(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            url: url.into(),
            detail: detail.into(),
        }
    }

    /// Creates a cookie file error.
    pub fn cookie(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Cookie {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

// Note on From trait implementations:
// We intentionally do NOT implement `From<reqwest::Error>` or `From<std::io::Error>`
// because the variants require context (url, path) that the source errors
// don't provide. The helper constructor methods are the pattern here.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_reference_display() {
        let error = Error::invalid_reference("not-a-course");
        let msg = error.to_string();
        assert!(msg.contains("invalid course reference"), "got: {msg}");
        assert!(msg.contains("not-a-course"), "got: {msg}");
    }

    #[test]
    fn test_not_authorized_display() {
        let error = Error::not_authorized("course-v1:Org+CS101+2026");
        let msg = error.to_string();
        assert!(msg.contains("course-v1:Org+CS101+2026"), "got: {msg}");
        assert!(msg.contains("enrollment"), "got: {msg}");
    }

    #[test]
    fn test_http_status_display() {
        let error = Error::http_status("https://example.com/video.mp4", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "got: {msg}");
        assert!(msg.contains("https://example.com/video.mp4"), "got: {msg}");
    }

    #[test]
    fn test_io_display_includes_path() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = Error::io(PathBuf::from("/tmp/lecture.mp4.part"), source);
        assert!(error.to_string().contains("/tmp/lecture.mp4.part"));
    }

    #[test]
    fn test_subtitle_format_display() {
        let error = Error::SubtitleFormat {
            url: "https://example.com/handler/save_user_state".to_string(),
            attempts: 3,
        };
        let msg = error.to_string();
        assert!(msg.contains("3 attempts"), "got: {msg}");
    }
}
