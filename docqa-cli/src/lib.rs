//! Command-line launcher and HTTP answer endpoint for docqa.
//!
//! This crate provides:
//! - Directory loading of `.txt`, `.md` and `.pdf` documents
//! - The `docqa` command line (`ingest`, `ask`, `serve`, `status`)
//! - An axum router exposing `POST /api/answer`
//! - Logging setup for the binary

pub mod cli;
pub mod loader;
pub mod server;
pub mod telemetry;

pub use cli::{Cli, Command, run};
pub use loader::load_documents;
pub use server::{AnswerRequest, AppState, ServerConfig, app_router, run_server};
pub use telemetry::{LogFormat, init_telemetry};
