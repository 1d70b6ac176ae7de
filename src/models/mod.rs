pub mod answer;
pub mod asset;
pub mod ocr;
pub mod question;
pub mod session;

pub use answer::{flatten_answers, AnswerItem};
pub use asset::{mime_for_extension, AssetRef, Image, ProcessedSet};
pub use ocr::{BoundingBox, RecognizedLine};
pub use question::{QuestionsResponse, SolvedQuestion};
pub use session::{PhotoSource, Session, SessionSnapshot};
