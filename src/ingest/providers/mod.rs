pub mod bluesky;
pub mod google_news;
pub mod reddit;
