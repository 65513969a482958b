//! arca-core: types shared by every arca crate
//!
//! - `error`: the umbrella error taxonomy collaborators report against
//! - `config`: the `arca.toml` schema and loader

pub mod config;
pub mod error;

pub use config::ArcaConfig;
pub use error::{ArcaError, ArcaResult};
