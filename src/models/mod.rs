mod post;
mod report;
mod settings;

pub use post::{sign_body, NewPost, Post, PostStatus};
pub use report::{EntryOutcome, ImportReport};
pub use settings::{keys, ScraperConfig, Settings};
