mod client;
mod types;

pub use client::{GeminiClient, GeminiSession};
pub use types::GenerationConfig;
