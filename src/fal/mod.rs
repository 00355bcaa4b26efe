//! fal.ai video generation integration.
//!
//! Clips are generated through fal.ai's asynchronous queue API: a request is
//! submitted, its status polled until it reaches a terminal state, and the
//! finished clip streamed to disk.

mod client;
mod request;
mod retry;

pub use client::{
    validate_prompt, FalClient, FalError, GenerationStatus, QueueResponse,
    DEFAULT_GENERATION_TIMEOUT, DEFAULT_MODEL, DEFAULT_POLL_INTERVAL, DEFAULT_REFERENCE_MODEL,
    FAL_API_BASE_URL, FAL_API_KEY_ENV,
};
pub use request::{AspectRatio, ClipDuration, Resolution, VideoRequest};
pub use retry::{calculate_backoff, RetryPolicy};
