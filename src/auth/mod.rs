//! Cookie file loading for the authenticated session.
//!
//! The tool does not perform login. It consumes a Netscape-format cookie
//! file (as exported by browsers and common extensions) and loads it into a
//! `reqwest` cookie jar. The platform additionally requires the CSRF cookie
//! value echoed in an `x-csrftoken` header on state-changing POSTs, so the
//! loaded [`Session`] surfaces that value separately.

use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;

/// Name of the CSRF cookie whose value goes into the `x-csrftoken` header.
const CSRF_COOKIE_NAME: &str = "csrftoken";

/// A single parsed cookie from a Netscape-format cookie file.
///
/// The value field is redacted in Debug output so cookie data never ends up
/// in logs.
#[derive(Clone)]
pub struct CookieLine {
    /// The domain the cookie belongs to (e.g., `.example.org`).
    pub domain: String,
    /// The URL path scope for the cookie.
    pub path: String,
    /// Whether the cookie should only be sent over HTTPS.
    pub secure: bool,
    /// Cookie name.
    pub name: String,
    value: String,
}

impl CookieLine {
    /// Returns the cookie value. Sensitive; avoid logging it.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for CookieLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieLine")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// An authenticated session: the cookie jar plus the CSRF token, if present.
#[derive(Clone)]
pub struct Session {
    /// Cookie jar for the HTTP client.
    pub jar: Arc<Jar>,
    /// Value of the CSRF cookie, echoed on state-changing POSTs.
    pub csrf_token: Option<String>,
}

// The token is session-scoped credential material; keep it out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("has_csrf", &self.csrf_token.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Returns an empty session with no cookies.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            jar: Arc::new(Jar::default()),
            csrf_token: None,
        }
    }
}

/// Parses a Netscape-format cookie file from a buffered reader.
///
/// Each non-comment, non-blank line must contain exactly 7 TAB-separated
/// fields: `domain`, `tailmatch`, `path`, `secure`, `expires`, `name`,
/// `value`. Lines starting with `#` and blank lines are skipped. Malformed
/// lines are skipped with a warning.
///
/// # Errors
///
/// Returns [`Error::Cookie`] when a non-empty file yields zero valid
/// cookies, or [`Error::Io`] on a read failure.
pub fn parse_netscape_cookies(
    reader: impl BufRead,
    path: &Path,
) -> Result<Vec<CookieLine>, Error> {
    let mut cookies = Vec::new();
    let mut malformed = 0usize;
    let mut non_blank_lines = 0usize;

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| Error::io(path.to_path_buf(), e))?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        non_blank_lines += 1;

        match parse_cookie_line(line) {
            Some(cookie) => {
                debug!(line = idx + 1, domain = %cookie.domain, name = %cookie.name, "parsed cookie");
                cookies.push(cookie);
            }
            None => {
                warn!(file = %path.display(), line = idx + 1, "skipping malformed cookie line");
                malformed += 1;
            }
        }
    }

    if cookies.is_empty() && non_blank_lines > 0 {
        return Err(Error::cookie(
            path,
            format!("no valid cookies found ({malformed} lines failed to parse)"),
        ));
    }

    Ok(cookies)
}

/// Parses one 7-field cookie line. `None` when the line is malformed.
fn parse_cookie_line(line: &str) -> Option<CookieLine> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 7 {
        return None;
    }

    let secure = match fields[3] {
        "TRUE" => true,
        "FALSE" => false,
        _ => return None,
    };
    // Expiry must at least be a non-negative integer (0 = session cookie).
    fields[4].parse::<u64>().ok()?;

    let domain = fields[0];
    let name = fields[5];
    if domain.is_empty() || name.is_empty() {
        return None;
    }

    Some(CookieLine {
        domain: domain.to_string(),
        path: fields[2].to_string(),
        secure,
        name: name.to_string(),
        value: fields[6].to_string(),
    })
}

/// Loads a cookie file into a [`Session`].
///
/// Every parsed cookie is added to the jar scoped to its own domain and
/// path; the CSRF token is pulled out by cookie name.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be opened, or the
/// [`parse_netscape_cookies`] errors.
pub fn load_session(path: &Path) -> Result<Session, Error> {
    let file = fs::File::open(path).map_err(|e| Error::io(path.to_path_buf(), e))?;
    let cookies = parse_netscape_cookies(BufReader::new(file), path)?;

    let jar = Jar::default();
    let mut csrf_token = None;
    let mut loaded = 0usize;

    for cookie in &cookies {
        let host = cookie.domain.trim_start_matches('.');
        let Ok(origin) = Url::parse(&format!("https://{host}/")) else {
            warn!(domain = %cookie.domain, name = %cookie.name, "skipping cookie with unusable domain");
            continue;
        };

        let secure = if cookie.secure { "; Secure" } else { "" };
        let header = format!(
            "{}={}; Domain={}; Path={}{}",
            cookie.name,
            cookie.value(),
            host,
            cookie.path,
            secure
        );
        jar.add_cookie_str(&header, &origin);
        loaded += 1;

        if cookie.name == CSRF_COOKIE_NAME {
            csrf_token = Some(cookie.value().to_string());
        }
    }

    debug!(
        file = %path.display(),
        cookies = loaded,
        has_csrf = csrf_token.is_some(),
        "session loaded from cookie file"
    );

    Ok(Session {
        jar: Arc::new(jar),
        csrf_token,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;

    use super::*;

    const SAMPLE: &str = "# Netscape HTTP Cookie File\n\
        .courses.example.org\tTRUE\t/\tTRUE\t1790000000\tcsrftoken\tabc123\n\
        .courses.example.org\tTRUE\t/\tTRUE\t1790000000\tsessionid\txyz789\n";

    fn parse(input: &str) -> Result<Vec<CookieLine>, Error> {
        parse_netscape_cookies(Cursor::new(input), &PathBuf::from("cookies.txt"))
    }

    #[test]
    fn test_parse_valid_file() {
        let cookies = parse(SAMPLE).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "csrftoken");
        assert_eq!(cookies[0].value(), "abc123");
        assert!(cookies[0].secure);
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let input = format!("\n# a comment\n\n{SAMPLE}");
        let cookies = parse(&input).unwrap();
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let input = format!("{SAMPLE}only\tthree\tfields\n");
        let cookies = parse(&input).unwrap();
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn test_parse_rejects_file_with_no_valid_cookies() {
        let result = parse("garbage line without tabs\n");
        assert!(matches!(result, Err(Error::Cookie { .. })));
    }

    #[test]
    fn test_parse_empty_file_yields_no_cookies() {
        let cookies = parse("").unwrap();
        assert!(cookies.is_empty());
    }

    #[test]
    fn test_debug_redacts_value() {
        let cookies = parse(SAMPLE).unwrap();
        let rendered = format!("{:?}", cookies[0]);
        assert!(rendered.contains("[REDACTED]"), "got: {rendered}");
        assert!(!rendered.contains("abc123"), "got: {rendered}");
    }

    #[test]
    fn test_load_session_extracts_csrf_token() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("cookies.txt");
        fs::write(&path, SAMPLE).unwrap();

        let session = load_session(&path).unwrap();
        assert_eq!(session.csrf_token.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_load_session_missing_file_is_io_error() {
        let result = load_session(Path::new("/nonexistent/cookies.txt"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
