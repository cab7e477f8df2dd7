//! Byte bodies of file entries, kept on local disk.
//!
//! Bodies live at `base_path/{account_id}/{volume}/{key}`, so renaming a
//! folder or a volume is a single directory rename. Folder entries map to directories
//! that are created on demand.

use crate::errors::{StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

/// What was written for a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyInfo {
    pub size: i64,
    /// Hex MD5 of the written bytes; `None` for folders.
    pub etag: Option<String>,
}

#[async_trait]
pub trait BodyRepository: Send + Sync {
    /// Write a file body from `body`, or create a folder when `body` is `None`.
    async fn create<S>(&self, path: &Path, body: Option<S>) -> StoreResult<BodyInfo>
    where
        S: Stream<Item = io::Result<Bytes>> + Send;

    /// Move a body (file or whole folder) to a new path.
    async fn update(&self, old_path: &Path, new_path: &Path) -> StoreResult<()>;

    async fn open(&self, path: &Path) -> StoreResult<File>;

    async fn copy(&self, from: &Path, to: &Path) -> StoreResult<()>;

    /// Remove a body; missing bodies are not an error.
    async fn delete(&self, path: &Path) -> StoreResult<()>;
}

/// Relative body path for a key inside an account's volume.
///
/// Rejects `.`/`..` components and empty components other than the
/// trailing one of a folder key, so a key can never escape its volume.
pub fn body_path(account_id: Uuid, volume: &str, key: &str) -> StoreResult<PathBuf> {
    let invalid = || StoreError::InvalidBodyPath(format!("{}/{}", volume, key));
    if volume.is_empty() || volume == "." || volume == ".." {
        return Err(invalid());
    }

    let mut path = PathBuf::from(account_id.to_string());
    path.push(volume);
    if key.is_empty() {
        return Ok(path);
    }

    let parts: Vec<&str> = key.split('/').collect();
    let last = parts.len() - 1;
    for (idx, part) in parts.into_iter().enumerate() {
        match part {
            "" if idx == last => {}
            "" | "." | ".." => return Err(invalid()),
            part => path.push(part),
        }
    }
    Ok(path)
}

#[derive(Clone, Debug)]
pub struct DiskBodyRepository {
    base_path: PathBuf,
}

impl DiskBodyRepository {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        self.base_path.join(path)
    }

    /// Stream bytes into a temp file, fsync, then rename into place.
    async fn write_file<S>(&self, file_path: &Path, stream: S) -> StoreResult<BodyInfo>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "body path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StoreError::Io(err));
                }
            };
            size += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        Ok(BodyInfo {
            size,
            etag: Some(format!("{:x}", digest.compute())),
        })
    }
}

#[async_trait]
impl BodyRepository for DiskBodyRepository {
    async fn create<S>(&self, path: &Path, body: Option<S>) -> StoreResult<BodyInfo>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let target = self.absolute(path);
        match body {
            Some(stream) => self.write_file(&target, stream).await,
            None => {
                fs::create_dir_all(&target).await?;
                Ok(BodyInfo {
                    size: 0,
                    etag: None,
                })
            }
        }
    }

    async fn update(&self, old_path: &Path, new_path: &Path) -> StoreResult<()> {
        let from = self.absolute(old_path);
        let to = self.absolute(new_path);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::rename(&from, &to).await {
            Ok(()) => Ok(()),
            // Folders materialized as ancestors may never have had a directory.
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no body at {}, nothing to move", from.display());
                Ok(())
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    async fn open(&self, path: &Path) -> StoreResult<File> {
        File::open(self.absolute(path)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound
            } else {
                StoreError::Io(err)
            }
        })
    }

    async fn copy(&self, from: &Path, to: &Path) -> StoreResult<()> {
        let target = self.absolute(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(self.absolute(from), &target).await?;
        Ok(())
    }

    async fn delete(&self, path: &Path) -> StoreResult<()> {
        let target = self.absolute(path);
        let result = match fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&target).await,
            Ok(_) => fs::remove_file(&target).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                debug!("removed body {}", target.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio::io::AsyncReadExt;

    type Chunks = stream::Iter<std::vec::IntoIter<io::Result<Bytes>>>;

    fn chunks(parts: &[&'static str]) -> Chunks {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn read_all(repo: &DiskBodyRepository, path: &Path) -> String {
        let mut file = repo.open(path).await.unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).await.unwrap();
        out
    }

    const ACCOUNT: Uuid = Uuid::from_u128(0x1234);

    fn path(key: &str) -> PathBuf {
        body_path(ACCOUNT, "docs", key).unwrap()
    }

    #[test]
    fn body_path_maps_keys_below_volume() {
        let root = PathBuf::from(ACCOUNT.to_string()).join("docs");
        assert_eq!(path("a/b/c.txt"), root.join("a/b/c.txt"));
        assert_eq!(path("a/b/"), root.join("a/b"));
        assert_eq!(path(""), root);
    }

    #[test]
    fn body_path_rejects_escapes() {
        for key in ["../etc/passwd", "a/../../b", "./a", "/abs", "a//b"] {
            assert!(
                matches!(body_path(ACCOUNT, "docs", key), Err(StoreError::InvalidBodyPath(_))),
                "{key}"
            );
        }
        assert!(body_path(ACCOUNT, "..", "a").is_err());
    }

    #[tokio::test]
    async fn create_streams_and_digests() {
        let dir = tempfile::tempdir().unwrap();
        let repo = DiskBodyRepository::new(dir.path());
        let target = path("a/b/hello.txt");

        let info = repo
            .create(&target, Some(chunks(&["hello ", "world"])))
            .await
            .unwrap();

        assert_eq!(info.size, 11);
        assert_eq!(
            info.etag.as_deref(),
            Some("5eb63bbbe01eeed093cb22bb8f5acdc3")
        );
        assert_eq!(read_all(&repo, &target).await, "hello world");
    }

    #[tokio::test]
    async fn create_without_body_makes_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let repo = DiskBodyRepository::new(dir.path());
        let target = path("photos/");

        let info = repo.create(&target, None::<Chunks>).await.unwrap();
        assert_eq!(info, BodyInfo { size: 0, etag: None });
        assert!(dir.path().join(&target).is_dir());
    }

    #[tokio::test]
    async fn update_moves_whole_folders() {
        let dir = tempfile::tempdir().unwrap();
        let repo = DiskBodyRepository::new(dir.path());
        let file = path("old/x.txt");
        repo.create(&file, Some(chunks(&["x"]))).await.unwrap();

        repo.update(&path("old/"), &path("new/deeper/")).await.unwrap();

        let moved = path("new/deeper/x.txt");
        assert_eq!(read_all(&repo, &moved).await, "x");
        assert!(matches!(repo.open(&file).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn update_of_missing_body_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let repo = DiskBodyRepository::new(dir.path());
        repo.update(&path("ghost/"), &path("other/")).await.unwrap();
    }

    #[tokio::test]
    async fn copy_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let repo = DiskBodyRepository::new(dir.path());
        let src = path("a.txt");
        let dst = path("sub/a copy.txt");
        repo.create(&src, Some(chunks(&["abc"]))).await.unwrap();

        repo.copy(&src, &dst).await.unwrap();
        assert_eq!(read_all(&repo, &dst).await, "abc");

        repo.delete(&path("sub/")).await.unwrap();
        assert!(!dir.path().join(path("sub/")).exists());
        repo.delete(&dst).await.unwrap();
    }
}
