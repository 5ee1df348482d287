pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{cli::LocalStorage, order_config::OrderConfig};
pub use core::{
    assembler::OrderAssembler,
    catalog::Catalog,
    etl::{OrderEngine, RunContext, RunSummary},
    resolver::QuantityResolver,
};
pub use utils::error::{OrderError, Result};
