// Adapters layer: concrete readers and writers for external formats.

pub mod archive;
pub mod demand_sheet;
pub mod xml;
