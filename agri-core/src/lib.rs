//! Core library for the `agri` client of the Krishi Mitra agricultural assistant.
//!
//! This crate defines:
//! - Configuration, including the persisted user location
//! - The backend abstraction and its REST implementation
//! - Shared domain models (predictions, chat replies, weather, crop advice)
//! - The `Session` that ties the user-facing operations together
//!
//! It is used by `agri-cli`, but can also be reused by other front ends.

pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod inflight;
pub mod model;
pub mod session;
pub mod upload;

pub use backend::{AgriBackend, HttpBackend};
pub use chat::{ChatMessage, ChatReply, ReplyFormat, Role, Transcript};
pub use config::{Config, DEFAULT_BASE_URL, DEFAULT_MAX_UPLOAD_BYTES};
pub use error::{ApiError, ApiResult};
pub use model::{Confidence, DetectionKind, Diagnosis, WeatherReport};
pub use session::{PredictionView, Session, WeatherView};
pub use upload::ImageUpload;
