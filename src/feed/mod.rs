mod fetcher;

pub use fetcher::{FeedEntry, FeedFetcher, FetchedFeed, ENTRY_CAP};
