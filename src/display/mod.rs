//! Terminal display utilities for the CLI.
//!
//! Provides styled tables and progress bars.

pub mod progress;
pub mod tables;

pub use progress::{create_progress_bar, create_spinner, with_spinner};
pub use tables::{create_info_table, create_recommendation_table};
