//! 品項目錄：測試名稱 → 包裝規格

use crate::domain::model::PackagingDescriptor;
use crate::utils::error::{OrderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;

fn default_unit_code() -> String {
    "TEST".to_string()
}

/// 設定檔中的原始品項，數量欄位尚未驗證
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductEntry {
    pub test_name: String,
    pub stock_code: String,
    pub stock_name: String,
    #[serde(default = "default_unit_code")]
    pub unit_code: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub vat_rate: String,
    #[serde(default)]
    pub warehouse_code: String,
    #[serde(default)]
    pub external_id: String,
    pub units_per_box: i64,
    pub sets_per_box: Option<i64>,
}

impl ProductEntry {
    fn into_descriptor(self) -> Result<PackagingDescriptor> {
        let test_name = self.test_name.trim().to_string();
        if test_name.is_empty() {
            return Err(OrderError::CatalogLoad {
                test_name: self.stock_code,
                reason: "test_name cannot be empty".to_string(),
            });
        }

        let units_per_box = u32::try_from(self.units_per_box)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| OrderError::CatalogLoad {
                test_name: test_name.clone(),
                reason: format!(
                    "units_per_box must be a positive integer, got {}",
                    self.units_per_box
                ),
            })?;

        let sets_per_box = match self.sets_per_box {
            None => 0,
            Some(sets) => u32::try_from(sets).map_err(|_| OrderError::CatalogLoad {
                test_name: test_name.clone(),
                reason: format!("sets_per_box must not be negative, got {}", sets),
            })?,
        };

        Ok(PackagingDescriptor {
            test_name,
            stock_code: self.stock_code,
            stock_name: self.stock_name,
            unit_code: self.unit_code,
            due_date: self.due_date,
            vat_rate: self.vat_rate,
            warehouse_code: self.warehouse_code,
            external_id: self.external_id,
            units_per_box,
            sets_per_box,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: Vec<ProductEntry>,
}

/// 唯讀目錄；任何一筆品項不合法時整個目錄載入失敗
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, PackagingDescriptor>,
}

impl Catalog {
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = ProductEntry>,
    {
        let mut map = HashMap::new();

        for entry in entries {
            let descriptor = entry.into_descriptor()?;
            if map.contains_key(&descriptor.test_name) {
                return Err(OrderError::CatalogLoad {
                    test_name: descriptor.test_name,
                    reason: "duplicate test name".to_string(),
                });
            }
            map.insert(descriptor.test_name.clone(), descriptor);
        }

        tracing::debug!("Catalog loaded with {} products", map.len());
        Ok(Self { entries: map })
    }

    /// 只解析品項，不驗證
    pub fn parse_entries(content: &str) -> Result<Vec<ProductEntry>> {
        let file: CatalogFile = toml::from_str(content).map_err(|e| OrderError::ConfigError {
            message: format!("Catalog TOML parsing error: {}", e),
        })?;
        Ok(file.products)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_entries(Self::parse_entries(content)?)
    }

    /// 精確比對；呼叫端需先去除前後空白
    pub fn lookup(&self, test_name: &str) -> Option<&PackagingDescriptor> {
        self.entries.get(test_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &PackagingDescriptor> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
[[products]]
test_name = "Glukoz (Serum/Plazma)"
stock_code = "3L8222"
stock_name = "CC GLUKOZ (R*5)(20 ML)(1500 TEST)(ABBOTT)"
due_date = "9.09.2025"
vat_rate = "10"
warehouse_code = "LOST"
external_id = "6464"
units_per_box = 1500
sets_per_box = 5

[[products]]
test_name = "TSH"
stock_code = "7K6230"
stock_name = "ARC.TSH (4*500 TEST)"
units_per_box = 2000
"#;

    #[test]
    fn test_load_catalog_from_toml() {
        let catalog = Catalog::from_toml_str(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let glucose = catalog.lookup("Glukoz (Serum/Plazma)").unwrap();
        assert_eq!(glucose.units_per_box.get(), 1500);
        assert_eq!(glucose.sets_per_box, 5);
        assert_eq!(glucose.unit_code, "TEST");

        let tsh = catalog.lookup("TSH").unwrap();
        assert_eq!(tsh.sets_per_box, 0);
        assert_eq!(tsh.vat_rate, "");
    }

    #[test]
    fn test_lookup_is_exact() {
        let catalog = Catalog::from_toml_str(CATALOG).unwrap();
        assert!(catalog.lookup("tsh").is_none());
        assert!(catalog.lookup(" TSH").is_none());
        assert!(catalog.lookup("Ferritin").is_none());
    }

    #[test]
    fn test_zero_units_per_box_fails_whole_catalog() {
        let content = r#"
[[products]]
test_name = "TSH"
stock_code = "7K6230"
stock_name = "ARC.TSH"
units_per_box = 2000

[[products]]
test_name = "Broken"
stock_code = "X"
stock_name = "X"
units_per_box = 0
"#;
        match Catalog::from_toml_str(content) {
            Err(OrderError::CatalogLoad { test_name, .. }) => assert_eq!(test_name, "Broken"),
            other => panic!("expected catalog error, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_values_rejected() {
        let negative_box = r#"
[[products]]
test_name = "A"
stock_code = "A"
stock_name = "A"
units_per_box = -10
"#;
        assert!(matches!(
            Catalog::from_toml_str(negative_box),
            Err(OrderError::CatalogLoad { .. })
        ));

        let negative_sets = r#"
[[products]]
test_name = "A"
stock_code = "A"
stock_name = "A"
units_per_box = 100
sets_per_box = -1
"#;
        assert!(matches!(
            Catalog::from_toml_str(negative_sets),
            Err(OrderError::CatalogLoad { .. })
        ));
    }

    #[test]
    fn test_duplicate_test_name_rejected() {
        let content = r#"
[[products]]
test_name = "TSH"
stock_code = "A"
stock_name = "A"
units_per_box = 100

[[products]]
test_name = "TSH "
stock_code = "B"
stock_name = "B"
units_per_box = 200
"#;
        assert!(matches!(
            Catalog::from_toml_str(content),
            Err(OrderError::CatalogLoad { .. })
        ));
    }
}
