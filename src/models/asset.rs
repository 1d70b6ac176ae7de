use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// 照片来源返回的照片引用
///
/// 两个引用是否为同一张照片只看 `id`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRef {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl AssetRef {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
        }
    }
}

impl PartialEq for AssetRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AssetRef {}

impl std::hash::Hash for AssetRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// 已加载的图片
#[derive(Debug, Clone)]
pub struct Image {
    /// 来源 id（照片 id 或拍摄序号）
    pub id: String,
    pub bytes: Arc<[u8]>,
    /// MIME 类型，如 `image/jpeg`
    pub mime: String,
}

impl Image {
    pub fn new(id: impl Into<String>, bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    /// 编码为 data URL，供 Vision API 使用
    pub fn to_data_url(&self) -> String {
        use base64::Engine;
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 根据文件扩展名推断 MIME 类型
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "heic" => Some("image/heic"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// 本次会话已经处理过的照片 id
///
/// 只增不减，只有开始新会话时才清空。
#[derive(Debug, Default, Clone)]
pub struct ProcessedSet {
    ids: HashSet<String>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个 id，返回是否是第一次出现
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// 过滤出尚未处理的照片，保持原有顺序
    pub fn unprocessed<'a>(&self, assets: &'a [AssetRef]) -> Vec<&'a AssetRef> {
        assets.iter().filter(|a| !self.contains(&a.id)).collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_identity_is_id() {
        let a = AssetRef::new("IMG_1.jpg", Utc::now());
        let b = AssetRef::new("IMG_1.jpg", Utc::now() - chrono::Duration::seconds(30));
        assert_eq!(a, b);
    }

    #[test]
    fn test_processed_set_filters_in_order() {
        let now = Utc::now();
        let assets = vec![
            AssetRef::new("a", now),
            AssetRef::new("b", now),
            AssetRef::new("c", now),
        ];
        let mut processed = ProcessedSet::new();
        assert!(processed.insert("b"));
        assert!(!processed.insert("b"));

        let pending: Vec<&str> = processed
            .unprocessed(&assets)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(pending, vec!["a", "c"]);
    }

    #[test]
    fn test_data_url() {
        let image = Image::new("x", vec![1u8, 2, 3], "image/png");
        assert_eq!(image.to_data_url(), "data:image/png;base64,AQID");
        assert_eq!(mime_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(mime_for_extension("txt"), None);
    }
}
