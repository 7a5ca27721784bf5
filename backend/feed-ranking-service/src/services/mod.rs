//! Service layer
//!
//! - hot_score: score formula
//! - feed: page assembly and caching
//! - media: media reference decryption and resolution
//! - reports: per-viewer post reports

pub mod feed;
pub mod hot_score;
pub mod media;
pub mod reports;

pub use feed::{parse_cursor, FeedService, FeedSettings, FeedStores, DEFAULT_AVATAR};
pub use hot_score::{age_hours_since, compute_hot_score};
pub use media::{
    EncryptedMediaResolver, MediaResolver, PlainMediaResolver, DEFAULT_MEDIA_URL,
};
pub use reports::ReportService;
