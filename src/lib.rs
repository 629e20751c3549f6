//! Assistant bridge - conversational webhook backend for hosted assistants
//!
//! Each station's chat widget posts user messages to a webhook. The bridge
//! maps the caller onto a persisted session, relays the message to the
//! station's assistant thread, executes any function calls the assistant
//! requests, and returns the final reply inline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │        Conversational platform webhooks          │
//! │        POST /webhook/{station}                   │
//! └───────────────────────┬──────────────────────────┘
//!                         │
//! ┌───────────────────────▼──────────────────────────┐
//! │                 Assistant Bridge                  │
//! │  Sessions │ Orchestrator │ Functions │ Jobs      │
//! └──────┬──────────────┬──────────────┬─────────────┘
//!        │              │              │
//!   SQLite store   Assistants API   Weather / Forms relay
//! ```

pub mod api;
pub mod assistant;
pub mod config;
pub mod daemon;
pub mod db;
pub mod error;
pub mod functions;
pub mod integrations;
pub mod jobs;
pub mod localtime;
pub mod session;
pub mod station;

pub use config::Config;
pub use daemon::Daemon;
pub use db::{DbConn, DbPool, DocumentStore};
pub use error::{Error, Result};
pub use session::{SessionManager, SessionPolicy, SessionStatus};
pub use station::{Station, StationRegistry};
