//! Hosted assistant integration
//!
//! Threads, runs and function calls for the station assistants, plus the
//! vector store operations used by the maintenance jobs.

mod client;
mod orchestrator;
mod poller;
pub mod types;

pub use client::{AssistantApi, DEFAULT_BASE_URL, OpenAiClient, VectorStoreApi};
pub use orchestrator::{FUNCTION_FAILURE_REPLY, Orchestrator, parse_reply};
pub use poller::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, RunPoller};
