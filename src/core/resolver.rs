//! 需求測試數 → 箱 / 組 的換算
//!
//! 需求一律向上取整到下一個可採購的包裝單位。輸出的測試數由取整後的
//! 箱數與組數重新計算，不沿用原始需求。

use crate::domain::model::{
    DemandValue, PackagingDescriptor, ResolvedOrderLine, RoundingMode, SkipReason,
};
use crate::utils::error::{OrderError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Line(ResolvedOrderLine),
    Skipped(SkipReason),
}

/// 要換算的需求量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Need {
    Units(u64),
    /// 需求為 0 但院所要求最低訂購：一組（無組時一箱）
    Minimum,
}

impl std::fmt::Display for Need {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Units(units) => write!(f, "{} tests", units),
            Self::Minimum => f.write_str("the minimum order for a zero demand"),
        }
    }
}

pub struct QuantityResolver;

impl QuantityResolver {
    /// 依院所的零需求政策換算一列需求
    pub fn resolve(
        descriptor: &PackagingDescriptor,
        demand: DemandValue,
        apply_min_roundup: bool,
    ) -> Result<Resolution> {
        let need = match demand {
            DemandValue::Positive(units) => Need::Units(units),
            DemandValue::Zero if apply_min_roundup => Need::Minimum,
            DemandValue::Zero => return Ok(Resolution::Skipped(SkipReason::ZeroDemand)),
            other => {
                // parse 階段的其餘分類一定帶有略過原因
                let reason = other.skip_reason().unwrap_or(SkipReason::NonNumericQuantity);
                return Ok(Resolution::Skipped(reason));
            }
        };

        Self::resolve_need(descriptor, need).map(Resolution::Line)
    }

    /// 正需求量的換算
    pub fn resolve_units(
        descriptor: &PackagingDescriptor,
        units: u64,
    ) -> Result<ResolvedOrderLine> {
        Self::resolve_need(descriptor, Need::Units(units))
    }

    fn resolve_need(descriptor: &PackagingDescriptor, need: Need) -> Result<ResolvedOrderLine> {
        let units_per_box = u64::from(descriptor.units_per_box.get());

        let (box_count, set_count, effective_quantity) = match descriptor.rounding_mode() {
            RoundingMode::BoxOnly => {
                let box_count = match need {
                    Need::Units(units) => units.div_ceil(units_per_box),
                    Need::Minimum => 1,
                };
                (box_count, 0, box_count * units_per_box)
            }
            RoundingMode::BoxAndSet { sets_per_box } => {
                let sets_per_box = u64::from(sets_per_box.get());
                // ceil(units / (units_per_box / sets_per_box))，以整數交叉相乘避免截斷每組測試數
                let total_sets = match need {
                    Need::Units(units) => (units * sets_per_box).div_ceil(units_per_box),
                    Need::Minimum => 1,
                };
                let box_count = total_sets / sets_per_box;
                let remainder_sets = total_sets % sets_per_box;
                let effective_quantity = total_sets * units_per_box / sets_per_box;
                (box_count, remainder_sets, effective_quantity)
            }
        };

        if box_count == 0 && set_count == 0 {
            return Err(OrderError::ResolverInvariant {
                test_name: descriptor.test_name.clone(),
                demand: need.to_string(),
            });
        }

        Ok(ResolvedOrderLine {
            box_count,
            set_count,
            effective_quantity,
            package_label: package_label(box_count, set_count),
        })
    }
}

/// "3K"、"2K + 1F"、"1F"
pub fn package_label(box_count: u64, set_count: u64) -> String {
    let mut parts = Vec::with_capacity(2);
    if box_count > 0 {
        parts.push(format!("{}K", box_count));
    }
    if set_count > 0 {
        parts.push(format!("{}F", set_count));
    }
    parts.join(" + ")
}
