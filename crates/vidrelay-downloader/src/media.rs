//! Disposal of downloaded files.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Delete a downloaded file. Failures are logged, never returned.
pub async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!(path = %path.display(), "remove_file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "remove_file failed"),
    }
}

/// Move `path` into `export_dir`, keeping its file name.
///
/// Falls back to copy-and-delete when a rename crosses filesystems.
pub async fn export_file(path: &Path, export_dir: &Path) -> io::Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    tokio::fs::create_dir_all(export_dir).await?;
    let dest = export_dir.join(name);

    if tokio::fs::rename(path, &dest).await.is_err() {
        tokio::fs::copy(path, &dest).await?;
        tokio::fs::remove_file(path).await?;
    }
    info!(from = %path.display(), to = %dest.display(), "file exported");
    Ok(dest)
}

/// Delete every regular file directly inside `dir`. Returns how many went.
pub async fn empty_media_folder(dir: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read media folder");
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "media folder listing failed");
                break;
            }
        };
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "remove_file failed"),
        }
    }
    info!(dir = %dir.display(), removed, "media folder emptied");
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remove_missing_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        remove_file(&dir.path().join("absent.mp4")).await;
    }

    #[tokio::test]
    async fn export_moves_the_file() {
        let media = tempfile::tempdir().unwrap();
        let export = tempfile::tempdir().unwrap();
        let src = media.path().join("clip.mp4");
        std::fs::write(&src, b"bytes").unwrap();

        let dest = export_file(&src, &export.path().join("sub")).await.unwrap();
        assert!(!src.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"bytes");
        assert_eq!(dest.file_name().unwrap(), "clip.mp4");
    }

    #[tokio::test]
    async fn empty_folder_keeps_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        std::fs::write(dir.path().join("b.part"), b"b").unwrap();
        std::fs::create_dir(dir.path().join("keep")).unwrap();

        assert_eq!(empty_media_folder(dir.path()).await, 2);
        assert!(dir.path().join("keep").is_dir());
        assert_eq!(empty_media_folder(&dir.path().join("missing")).await, 0);
    }
}
