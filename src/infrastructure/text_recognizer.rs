use async_trait::async_trait;

use crate::error::SolveError;
use crate::models::{Image, RecognizedLine};

/// OCR 能力：返回带位置和置信度的文字行
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &Image) -> Result<Vec<RecognizedLine>, SolveError>;
}
