use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

/// 目錄中的單一品項（載入後不可變）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackagingDescriptor {
    pub test_name: String,
    pub stock_code: String,
    pub stock_name: String,
    pub unit_code: String,
    pub due_date: String,
    pub vat_rate: String,
    pub warehouse_code: String,
    pub external_id: String,
    /// 一箱所含的測試數
    pub units_per_box: NonZeroU32,
    /// 一箱所含的組數，0 表示只能整箱訂購
    pub sets_per_box: u32,
}

impl PackagingDescriptor {
    pub fn rounding_mode(&self) -> RoundingMode {
        match NonZeroU32::new(self.sets_per_box) {
            Some(sets_per_box) => RoundingMode::BoxAndSet { sets_per_box },
            None => RoundingMode::BoxOnly,
        }
    }

    /// 每組測試數，僅供顯示；換算一律使用整數交叉相乘
    pub fn units_per_set(&self) -> Option<f64> {
        match self.rounding_mode() {
            RoundingMode::BoxAndSet { sets_per_box } => {
                Some(f64::from(self.units_per_box.get()) / f64::from(sets_per_box.get()))
            }
            RoundingMode::BoxOnly => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    BoxOnly,
    BoxAndSet { sets_per_box: NonZeroU32 },
}

/// 需求表中的一列，欄位值尚未解析
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandRow {
    pub test_name: String,
    pub raw_quantity: Option<String>,
    /// 來源資料中的列序（從 1 起算，不含標題列，空白列也計入）
    pub source_row: Option<usize>,
}

impl DemandRow {
    pub fn new(test_name: impl Into<String>, raw_quantity: Option<&str>) -> Self {
        Self {
            test_name: test_name.into(),
            raw_quantity: raw_quantity.map(str::to_string),
            source_row: None,
        }
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.source_row = Some(row);
        self
    }

    pub fn demand(&self) -> DemandValue {
        DemandValue::parse(self.raw_quantity.as_deref())
    }
}

/// 解析數量欄位；逗號視為小數點
pub fn parse_quantity(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(&raw.replace(',', ".")).ok()
}

/// 需求欄位解析後的分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandValue {
    Missing,
    NonNumeric,
    OutOfRange,
    Negative,
    Zero,
    Positive(u64),
}

impl DemandValue {
    /// 小數一律無條件進位到整數測試數
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::Missing;
        };

        match parse_quantity(raw) {
            Some(value) => Self::from_decimal(value),
            None => Self::NonNumeric,
        }
    }

    pub fn from_decimal(value: Decimal) -> Self {
        if value.is_zero() {
            return Self::Zero;
        }
        if value.is_sign_negative() {
            return Self::Negative;
        }

        match value.ceil().to_u32() {
            Some(whole) => Self::Positive(u64::from(whole)),
            None => Self::OutOfRange,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Missing => Some(SkipReason::MissingQuantity),
            Self::NonNumeric => Some(SkipReason::NonNumericQuantity),
            Self::OutOfRange => Some(SkipReason::QuantityOutOfRange),
            Self::Negative => Some(SkipReason::NegativeQuantity),
            Self::Zero | Self::Positive(_) => None,
        }
    }
}

/// 換算結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedOrderLine {
    pub box_count: u64,
    pub set_count: u64,
    pub effective_quantity: u64,
    pub package_label: String,
}

/// 已編號、可交給序列化器的訂單列
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub line_number: usize,
    pub descriptor: PackagingDescriptor,
    pub resolved: ResolvedOrderLine,
}

impl OrderLine {
    /// 輸出的數量永遠是換算後的測試數，不是原始需求
    pub fn quantity(&self) -> String {
        self.resolved.effective_quantity.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unmapped,
    MissingQuantity,
    NonNumericQuantity,
    QuantityOutOfRange,
    NegativeQuantity,
    ZeroDemand,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unmapped => "test name not in catalog",
            Self::MissingQuantity => "demand value is blank",
            Self::NonNumericQuantity => "demand value is not a number",
            Self::QuantityOutOfRange => "demand value is out of range",
            Self::NegativeQuantity => "demand value is negative",
            Self::ZeroDemand => "zero demand and minimum order policy disabled",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 來源資料中的列序（從 1 起算，不含標題列）
    pub row_number: usize,
    pub test_name: String,
    pub reason: SkipReason,
}

/// 單一院所組裝完成的訂單
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FacilityOrder {
    pub facility_id: String,
    pub lines: Vec<OrderLine>,
    pub skipped: Vec<SkippedRow>,
}

impl FacilityOrder {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// 訂單表頭欄位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub owner_id: String,
    pub document_no: String,
    pub facility_id: String,
    pub facility_display_name: String,
    pub city: String,
    pub country: String,
    pub notes: String,
    /// Excel 序列日期
    pub document_date: String,
    pub document_time: String,
}
