pub mod client;
pub mod error;
pub mod types;

pub use client::{AssistantsClient, AssistantsConfig, TextGenerator};
pub use error::AssistantError;
