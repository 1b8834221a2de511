#![forbid(unsafe_code)]

pub mod error;
pub mod review_service;
pub mod session;

pub use reels_core::Clock;

pub use error::SrsError;
pub use review_service::{RecordedReview, SrsService};
pub use session::{ReviewSession, SessionAnswer};
