use crate::core::catalog::Catalog;
use crate::core::resolver::{QuantityResolver, Resolution};
use crate::domain::model::{
    parse_quantity, DemandRow, DemandValue, FacilityOrder, OrderLine, SkipReason, SkippedRow,
};
use crate::utils::error::Result;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyPolicy {
    /// 需求為 0 時仍訂購最小包裝
    pub apply_min_roundup: bool,
    /// 先將同名測試的需求加總
    pub aggregate_duplicates: bool,
}

/// 將需求列依序換算成訂單列，略過無法對應或無效的列
pub struct OrderAssembler<'a> {
    catalog: &'a Catalog,
    policy: AssemblyPolicy,
}

impl<'a> OrderAssembler<'a> {
    pub fn new(catalog: &'a Catalog, policy: AssemblyPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn assemble<I>(&self, facility_id: &str, rows: I) -> Result<FacilityOrder>
    where
        I: IntoIterator<Item = DemandRow>,
    {
        let mut order = FacilityOrder {
            facility_id: facility_id.to_string(),
            ..Default::default()
        };

        let rows: Vec<DemandRow> = if self.policy.aggregate_duplicates {
            let aggregated = aggregate_rows(rows);
            for skipped in &aggregated.skipped {
                tracing::debug!(
                    "[{}] row {} '{}' left out of the total: {}",
                    facility_id,
                    skipped.row_number,
                    skipped.test_name,
                    skipped.reason
                );
            }
            order.skipped = aggregated.skipped;
            aggregated.totals
        } else {
            rows.into_iter().collect()
        };

        for (idx, row) in rows.into_iter().enumerate() {
            let row_number = row.source_row.unwrap_or(idx + 1);
            let test_name = row.test_name.trim();
            let demand = row.demand();

            let Some(descriptor) = self.catalog.lookup(test_name) else {
                if matches!(demand, DemandValue::Positive(_)) {
                    tracing::warn!(
                        "⚠️ [{}] row {}: '{}' is not in the catalog, not ordered",
                        facility_id,
                        row_number,
                        test_name
                    );
                } else {
                    tracing::debug!(
                        "[{}] row {}: unmapped '{}' without demand",
                        facility_id,
                        row_number,
                        test_name
                    );
                }
                order.skipped.push(SkippedRow {
                    row_number,
                    test_name: test_name.to_string(),
                    reason: SkipReason::Unmapped,
                });
                continue;
            };

            match QuantityResolver::resolve(descriptor, demand, self.policy.apply_min_roundup)? {
                Resolution::Line(resolved) => {
                    tracing::debug!(
                        "[{}] {} -> {} ({} tests)",
                        facility_id,
                        test_name,
                        resolved.package_label,
                        resolved.effective_quantity
                    );
                    order.lines.push(OrderLine {
                        line_number: order.lines.len() + 1,
                        descriptor: descriptor.clone(),
                        resolved,
                    });
                }
                Resolution::Skipped(reason) => {
                    tracing::debug!(
                        "[{}] row {} '{}' skipped: {}",
                        facility_id,
                        row_number,
                        test_name,
                        reason
                    );
                    order.skipped.push(SkippedRow {
                        row_number,
                        test_name: test_name.to_string(),
                        reason,
                    });
                }
            }
        }

        Ok(order)
    }
}

/// 同名測試加總後的結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedRows {
    pub totals: Vec<DemandRow>,
    /// 負值的列不計入總和，逐列記錄
    pub skipped: Vec<SkippedRow>,
}

/// 依測試名稱（去除空白後）加總需求，保留第一次出現的順序與列號。
/// 無法解析的值不計入總和；整組都沒有數值時保留空白。
/// 整組只有負值時，該組不會出現在結果中。
pub fn aggregate_rows<I>(rows: I) -> AggregatedRows
where
    I: IntoIterator<Item = DemandRow>,
{
    struct Group {
        name: String,
        source_row: usize,
        total: Option<Decimal>,
        kept_rows: usize,
    }

    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut skipped = Vec::new();

    for (idx, row) in rows.into_iter().enumerate() {
        let name = row.test_name.trim().to_string();
        let source_row = row.source_row.unwrap_or(idx + 1);
        let value = row.raw_quantity.as_deref().and_then(parse_quantity);

        let slot = *index.entry(name.clone()).or_insert_with(|| {
            groups.push(Group {
                name: name.clone(),
                source_row,
                total: None,
                kept_rows: 0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];

        match value {
            Some(value) if value.is_sign_negative() && !value.is_zero() => {
                skipped.push(SkippedRow {
                    row_number: source_row,
                    test_name: name,
                    reason: SkipReason::NegativeQuantity,
                });
            }
            Some(value) => {
                group.total = Some(group.total.unwrap_or(Decimal::ZERO) + value);
                group.kept_rows += 1;
            }
            None => group.kept_rows += 1,
        }
    }

    let totals = groups
        .into_iter()
        .filter(|group| group.kept_rows > 0)
        .map(|group| DemandRow {
            test_name: group.name,
            raw_quantity: group.total.map(|t| t.normalize().to_string()),
            source_row: Some(group.source_row),
        })
        .collect();

    AggregatedRows { totals, skipped }
}
