//! 目录照片库
//!
//! 眼镜的配套 App 把照片同步到一个本地目录，这里按文件修改时间把目录当成照片库。

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, warn};

use super::photo_library::PhotoLibrary;
use crate::error::PhotoError;
use crate::models::{mime_for_extension, AssetRef, Image};

/// 目录照片库
pub struct FolderPhotoLibrary {
    folder: PathBuf,
}

impl FolderPhotoLibrary {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    fn folder_display(&self) -> String {
        self.folder.display().to_string()
    }
}

#[async_trait]
impl PhotoLibrary for FolderPhotoLibrary {
    async fn fetch_new_assets(&self, since: DateTime<Utc>) -> Result<Vec<AssetRef>, PhotoError> {
        let mut entries = fs::read_dir(&self.folder)
            .await
            .map_err(|e| PhotoError::from_io(self.folder_display(), e))?;

        let mut assets = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PhotoError::from_io(self.folder_display(), e))?
        {
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|s| s.to_str())
                .and_then(mime_for_extension)
                .is_some();
            if !is_image {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    // 同步中的文件可能暂时不可读，下次轮询再看
                    warn!("读取文件信息失败 {}: {}", path.display(), e);
                    continue;
                }
            };

            let created_at: DateTime<Utc> = match metadata.modified() {
                Ok(time) => time.into(),
                Err(_) => continue,
            };
            if created_at < since {
                continue;
            }

            let id = entry.file_name().to_string_lossy().to_string();
            assets.push(AssetRef::new(id, created_at));
        }

        assets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        debug!("目录 {} 中有 {} 张新照片", self.folder.display(), assets.len());

        Ok(assets)
    }

    async fn load_image(&self, asset: &AssetRef) -> Option<Image> {
        let path = self.folder.join(&asset.id);
        let mime = path
            .extension()
            .and_then(|s| s.to_str())
            .and_then(mime_for_extension)?;

        match fs::read(&path).await {
            Ok(bytes) if !bytes.is_empty() => Some(Image::new(asset.id.clone(), bytes, mime)),
            Ok(_) => {
                warn!("照片为空: {}", path.display());
                None
            }
            Err(e) => {
                warn!("加载照片失败 {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_filters_non_images_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"bbb").unwrap();
        std::fs::write(dir.path().join("a.png"), b"aaa").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"text").unwrap();
        std::fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        let library = FolderPhotoLibrary::new(dir.path());
        let since = Utc::now() - chrono::Duration::minutes(5);
        let assets = library.fetch_new_assets(since).await.unwrap();

        let mut ids: Vec<&str> = assets.iter().map(|a| a.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a.png", "b.jpg"]);
    }

    #[tokio::test]
    async fn test_old_photos_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.jpg"), b"old").unwrap();

        let library = FolderPhotoLibrary::new(dir.path());
        let since = Utc::now() + chrono::Duration::minutes(5);
        assert!(library.fetch_new_assets(since).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_folder_is_reported() {
        let library = FolderPhotoLibrary::new("/definitely/not/a/folder");
        let err = library.fetch_new_assets(Utc::now()).await.unwrap_err();
        assert!(matches!(err, PhotoError::FolderNotFound { .. }));
    }

    #[tokio::test]
    async fn test_load_image_reads_bytes_and_mime() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("q.jpeg"), b"\xFF\xD8\xFF").unwrap();
        std::fs::write(dir.path().join("empty.png"), b"").unwrap();

        let library = FolderPhotoLibrary::new(dir.path());
        let image = library
            .load_image(&AssetRef::new("q.jpeg", Utc::now()))
            .await
            .unwrap();
        assert_eq!(image.mime, "image/jpeg");
        assert_eq!(&image.bytes[..], b"\xFF\xD8\xFF");

        assert!(library
            .load_image(&AssetRef::new("empty.png", Utc::now()))
            .await
            .is_none());
        assert!(library
            .load_image(&AssetRef::new("gone.jpg", Utc::now()))
            .await
            .is_none());
    }
}
