//! # fleet-cli
//!
//! The `fleet` command-line launcher: environment settings, logging,
//! ingestion of maintenance data, and the `init` / `ask` / `info` commands
//! over a [`fleet_rag::RagPipeline`].

pub mod app;
pub mod commands;
pub mod ingest;
pub mod logging;
pub mod settings;

pub use app::AppContext;
pub use commands::{Cli, Command, run};
pub use ingest::DocumentLoader;
pub use settings::Settings;
