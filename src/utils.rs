//! Utility functions

use crate::file::DownloadFile;
use std::path::{Path, PathBuf};
use url::Url;

/// Derive a display name for a file from its URL.
///
/// Uses the last path segment, falling back to the first query value and
/// finally to `"Unknown"`.
pub fn name_from_url(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return "Unknown".to_string();
    };

    if let Some(segments) = url.path_segments() {
        if let Some(last) = segments.filter(|s| !s.is_empty()).last() {
            return last.to_string();
        }
    }

    // No usable path; take the value of the first query pair, e.g. ?file=name
    if let Some(query) = url.query() {
        if let Some((_, value)) = query.split('&').next().and_then(|p| p.split_once('=')) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }

    "Unknown".to_string()
}

/// Uppercase the first character of a reason string.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Write a failure report for a file into `dir`.
///
/// Used when verbose diagnostics are enabled and a file fails terminally
/// through the transport or defect path.
pub async fn write_debug_report(dir: &Path, file: &DownloadFile) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(format!(
        "report_{}_{}.txt",
        file.id(),
        chrono::Utc::now().timestamp()
    ));

    let report = format!(
        "id: {}\npackage: {}\nname: {}\nurl: {}\nstatus: {}\nerror: {}\n",
        file.id(),
        file.package(),
        file.name(),
        file.url(),
        file.status(),
        file.error().unwrap_or_default(),
    );
    tokio::fs::write(&path, report).await?;

    Ok(path)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileId, PackageId};
    use std::sync::Arc;

    #[test]
    fn name_from_url_takes_last_path_segment() {
        assert_eq!(
            name_from_url("http://example.com/files/archive.zip"),
            "archive.zip"
        );
    }

    #[test]
    fn name_from_url_ignores_trailing_slash() {
        assert_eq!(name_from_url("http://example.com/files/video.mkv/"), "video.mkv");
    }

    #[test]
    fn name_from_url_falls_back_to_query_value() {
        assert_eq!(
            name_from_url("http://example.com/?file=doc.pdf"),
            "doc.pdf"
        );
    }

    #[test]
    fn name_from_url_unknown_for_bare_host() {
        assert_eq!(name_from_url("http://example.com"), "Unknown");
        assert_eq!(name_from_url("http://example.com/?x"), "Unknown");
    }

    #[test]
    fn name_from_url_unknown_for_garbage() {
        assert_eq!(name_from_url("not a url"), "Unknown");
    }

    #[test]
    fn capitalize_uppercases_first_char_only() {
        assert_eq!(capitalize("empty file"), "Empty file");
        assert_eq!(capitalize("html error"), "Html error");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test]
    async fn debug_report_contains_file_fields() {
        let dir = tempfile::tempdir().unwrap();
        let file = Arc::new(DownloadFile::new(
            FileId(11),
            PackageId(2),
            "http://example.com/broken.bin",
        ));
        file.set_error(Some("connection reset".to_string()));

        let path = write_debug_report(dir.path(), &file).await.unwrap();
        let contents = std::fs::read_to_string(path).unwrap();

        assert!(contents.contains("id: 11"));
        assert!(contents.contains("url: http://example.com/broken.bin"));
        assert!(contents.contains("error: connection reset"));
    }
}
