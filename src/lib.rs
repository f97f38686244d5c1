pub mod cli;
pub mod drafting;
pub mod error;
pub mod gemini;
pub mod invite;
pub mod lifecycle;
pub mod metadata;
pub mod progress;
pub mod server;
pub mod storage;
pub mod store;
pub mod supabase;
pub mod tracker;
pub mod types;

pub use error::{TrackerError, TrackerResult};
pub use tracker::Tracker;
