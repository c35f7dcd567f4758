use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("create directory {path}: {source}")]
    CreateDir {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} exists and is not a directory")]
    NotADirectory { path: Utf8PathBuf },
    #[error("write {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rename {from} -> {to}: {source}")]
    Rename {
        from: Utf8PathBuf,
        to: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Create `path` and any missing parents. Returns `true` when something was
/// created; an existing directory is not an error.
pub async fn ensure_dir(path: &Utf8Path) -> Result<bool, StagingError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {
            debug!("Directory '{}' exists, ignore creation", path);
            return Ok(false);
        }
        Ok(_) => {
            return Err(StagingError::NotADirectory {
                path: path.to_owned(),
            })
        }
        Err(_) => {}
    }

    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| StagingError::CreateDir {
            path: path.to_owned(),
            source,
        })?;
    info!("New directory '{}'", path);
    Ok(true)
}

/// Sibling temp path used while writing `path`.
pub fn part_path(path: &Utf8Path) -> Utf8PathBuf {
    let name = path.file_name().unwrap_or("download");
    path.with_file_name(format!("{name}.part"))
}

/// Write `bytes` to `<path>.part`, flush it to disk and rename it over
/// `path`. A crash leaves at most a stray `.part` file, never a truncated
/// `path`.
pub async fn write_atomic(path: &Utf8Path, bytes: &[u8]) -> Result<(), StagingError> {
    let tmp = part_path(path);

    let res = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;

    if let Err(source) = res {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StagingError::Write {
            path: path.to_owned(),
            source,
        });
    }

    if let Err(source) = robust_rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StagingError::Rename {
            from: tmp,
            to: path.to_owned(),
            source,
        });
    }
    Ok(())
}

/// Blocking counterpart of [`write_atomic`] for small metadata files.
pub fn write_atomic_sync(path: &Utf8Path, bytes: &[u8]) -> Result<(), StagingError> {
    let tmp = part_path(path);

    let res = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();

    if let Err(source) = res {
        let _ = std::fs::remove_file(&tmp);
        return Err(StagingError::Write {
            path: path.to_owned(),
            source,
        });
    }

    if let Err(source) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(StagingError::Rename {
            from: tmp,
            to: path.to_owned(),
            source,
        });
    }
    Ok(())
}

/// Rename with exponential backoff. Virus scanners and indexers on some
/// platforms briefly hold freshly written files open.
pub async fn robust_rename(from: &Utf8Path, to: &Utf8Path) -> std::io::Result<()> {
    let mut attempt = 0u32;
    let max_attempts = 8u32;
    let mut backoff = Duration::from_millis(50);

    loop {
        match tokio::fs::rename(from, to).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(e);
                }
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, Duration::from_millis(2000));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[tokio::test]
    async fn ensure_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = utf8(&dir).join("a").join("b");

        assert!(ensure_dir(&target).await.unwrap());
        assert!(!ensure_dir(&target).await.unwrap());
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn ensure_dir_rejects_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = utf8(&dir).join("file");
        std::fs::write(&target, b"x").unwrap();

        assert!(matches!(
            ensure_dir(&target).await,
            Err(StagingError::NotADirectory { .. })
        ));
    }

    #[tokio::test]
    async fn write_atomic_replaces_content_and_leaves_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = utf8(&dir).join("platea.csv");
        std::fs::write(&target, b"old").unwrap();

        write_atomic(&target, b"new,content\n").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new,content\n");
        assert!(!part_path(&target).exists());
    }

    #[tokio::test]
    async fn write_atomic_into_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let target = utf8(&dir).join("missing").join("x.csv");

        let err = write_atomic(&target, b"x").await.unwrap_err();
        assert!(matches!(err, StagingError::Write { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn write_atomic_sync_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = utf8(&dir).join("last-update-dataset.json");

        write_atomic_sync(&target, b"{}").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"{}");
        assert!(!part_path(&target).exists());
    }

    #[test]
    fn part_path_keeps_extension() {
        assert_eq!(
            part_path(Utf8Path::new("/d/a.csv")),
            Utf8PathBuf::from("/d/a.csv.part")
        );
    }
}
