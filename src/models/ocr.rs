use serde::{Deserialize, Serialize};

/// 归一化的文字框，原点在左下角，y 轴向上
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 垂直中点
    pub fn mid_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// OCR 识别出的一行文字
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedLine {
    pub text: String,
    /// 置信度 [0, 1]
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

impl RecognizedLine {
    pub fn new(text: impl Into<String>, confidence: f32, bounding_box: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            bounding_box,
        }
    }
}
