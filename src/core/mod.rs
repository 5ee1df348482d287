pub mod assembler;
pub mod catalog;
pub mod etl;
pub mod pipeline;
pub mod resolver;

pub use crate::domain::model::{DemandRow, FacilityOrder, OrderLine, ResolvedOrderLine};
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
