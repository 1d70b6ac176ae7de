use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PhotoError;
use crate::models::{AssetRef, Image};

/// 照片库能力
///
/// 眼镜拍摄的照片经过同步后出现在这里，同步有延迟，照片会陆续到达。
#[async_trait]
pub trait PhotoLibrary: Send + Sync {
    /// 获取 `since` 之后创建的照片，按创建时间升序
    async fn fetch_new_assets(&self, since: DateTime<Utc>) -> Result<Vec<AssetRef>, PhotoError>;

    /// 加载照片内容，失败时返回 None
    async fn load_image(&self, asset: &AssetRef) -> Option<Image>;
}
