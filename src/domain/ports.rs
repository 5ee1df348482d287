use crate::domain::model::{DemandRow, FacilityOrder};
use crate::utils::error::Result;

pub trait Storage {
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}

/// 單一院所的 extract / transform / load
pub trait Pipeline {
    fn extract(&self) -> Result<Vec<DemandRow>>;
    fn transform(&self, rows: Vec<DemandRow>) -> Result<FacilityOrder>;
    /// 沒有任何訂單列時回傳 `None`（不產生文件）
    fn load(&self, order: &FacilityOrder) -> Result<Option<String>>;
}
