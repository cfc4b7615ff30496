//! Safeonweb.be phishing-campaign RSS ingestion (spec §4.D)

pub mod brand_extractor;
pub mod rss;

pub use brand_extractor::extract_brands;
pub use rss::parse_feed;
