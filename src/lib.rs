#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod alerts;
pub mod app;
pub mod cli;
pub mod config;
pub mod continuity;
pub mod daemon;
pub mod db;
#[doc(hidden)]
pub mod diagnostics;
pub mod error;
pub mod heartbeat;
pub mod recovery;
pub mod runtime;
pub mod telemetry;
pub mod tenancy;
#[doc(hidden)]
pub mod util;

pub use config::Config;
pub use error::{Result, WardenError};
