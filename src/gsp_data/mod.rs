pub mod error;
pub mod fetcher;
pub mod series_cache;
pub mod source;
