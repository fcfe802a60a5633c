mod image;
mod text;

pub use image::{collect_image_candidates, ImageStore, StoredImage, MIN_HEIGHT, MIN_WIDTH};
pub use text::{extract_article_text, summary_text, MAX_BODY_CHARS, MIN_BODY_CHARS};
