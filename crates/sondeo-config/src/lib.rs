//! Pipeline configuration for the sondeo analyzer.
//!
//! A TOML file describes the protocol version, the cycle budgets and every
//! processing with its channels, pre-filter, target rate and handlers.
//! [`Config::build`] turns it into the typed [`OrchestratorParams`] the
//! analyzer runs on.
//!
//! # Features
//!
//! - **TOML round trip**: [`Config::load`], [`Config::from_toml`], [`Config::save`]
//! - **Validation**: protocol version, channel names, handler kinds and
//!   options, source references and cycles are all checked by `build`
//! - **Free declaration order**: handlers are sorted by their sources
//!
//! # Example
//!
//! ```rust
//! use sondeo_config::{Config, HandlerConfig, ProcessingConfig};
//!
//! let config = Config::default().with_processing(
//!     "levels",
//!     ProcessingConfig::default()
//!         .with_channels(["left", "right"])
//!         .with_handler(
//!             HandlerConfig::new("rms", "BlockRms").with_option("updateInterval", 20.0),
//!         )
//!         .with_handler(
//!             HandlerConfig::new("db", "transformer")
//!                 .with_option("source", "rms")
//!                 .with_option("transform", "db, map -70 0, clamp"),
//!         ),
//! );
//!
//! let params = config.build().unwrap();
//! let order: Vec<_> = params.processings["levels"].order().collect();
//! assert_eq!(order, ["rms", "db"]);
//! ```

mod config;
mod error;
mod processing;

pub use config::Config;
pub use error::ConfigError;
pub use processing::{HandlerConfig, OptionValue, ProcessingConfig};

/// Re-export of the typed output.
pub use sondeo_analysis::OrchestratorParams;
