//! On-disk snapshots: operator `html`/`screenshot` requests and the
//! diagnostics captured when a session fails.

use std::path::{Path, PathBuf};

use {
    chatsync_channels::Diagnostics,
    chrono::{DateTime, Utc},
    tracing::info,
};

const FILE_STAMP: &str = "%Y.%m.%d.%H.%M.%S";

/// `YYYY.MM.DD.HH.MM.SS.<extension>`, in UTC.
pub fn dump_file_name(at: DateTime<Utc>, extension: &str) -> String {
    format!("{}.{extension}", at.format(FILE_STAMP))
}

/// Write one dump, creating `dir` if needed. Returns the file path.
pub async fn write_dump(
    dir: &Path,
    at: DateTime<Utc>,
    extension: &str,
    contents: &[u8],
) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(dump_file_name(at, extension));
    tokio::fs::write(&path, contents).await?;
    info!(path = %path.display(), bytes = contents.len(), "dump written");
    Ok(path)
}

/// Write whatever part of `diagnostics` was captured.
pub async fn write_diagnostics(
    dir: &Path,
    at: DateTime<Utc>,
    diagnostics: &Diagnostics,
) -> std::io::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    if let Some(markup) = &diagnostics.markup {
        written.push(write_dump(dir, at, "html", markup.as_bytes()).await?);
    }
    if let Some(image) = &diagnostics.image {
        written.push(write_dump(dir, at, "png", image).await?);
    }
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, chrono::TimeZone};

    #[test]
    fn file_name_uses_dotted_utc_stamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(dump_file_name(at, "png"), "2024.03.07.09.05.01.png");
    }

    #[tokio::test]
    async fn creates_missing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("dumps/html");
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let path = write_dump(&dir, at, "html", b"<html></html>").await.unwrap();
        assert_eq!(path, dir.join("2024.01.02.03.04.05.html"));
        assert_eq!(std::fs::read(&path).unwrap(), b"<html></html>");
    }

    #[tokio::test]
    async fn writes_only_captured_parts() {
        let tmp = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let diagnostics = Diagnostics {
            markup: Some("<body/>".into()),
            image: None,
        };

        let written = write_diagnostics(tmp.path(), at, &diagnostics).await.unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("2024.01.02.03.04.05.html"));
    }
}
