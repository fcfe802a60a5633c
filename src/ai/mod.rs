mod rewriter;

pub use rewriter::{fallback_rewrite, looks_french, parse_rewrite, Rewriter, Rewritten};
