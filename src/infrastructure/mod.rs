//! 基础设施层
//!
//! 持有外部资源（照片库、朗读引擎、OCR），只暴露能力，不认识会话和答案队列。

pub mod folder_library;
pub mod photo_library;
pub mod speaker;
pub mod text_recognizer;

pub use folder_library::FolderPhotoLibrary;
pub use photo_library::PhotoLibrary;
pub use speaker::{CommandSpeaker, LogSpeaker, Speaker};
pub use text_recognizer::TextRecognizer;
