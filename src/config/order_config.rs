use crate::core::assembler::AssemblyPolicy;
use crate::core::catalog::{Catalog, ProductEntry};
use crate::utils::dates::parse_document_date;
use crate::utils::error::{OrderError, Result};
use crate::utils::validation::{
    validate_file_extensions, validate_non_empty_string, validate_path, Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

fn default_owner_id() -> String {
    "12600".to_string()
}

fn default_test_name_column() -> String {
    "TEST ADI".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfig {
    pub run: RunSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub facilities: Vec<FacilityConfig>,

    /// 設定檔所在目錄，相對路徑以此為基準
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    pub output_dir: String,
    #[serde(default = "default_true")]
    pub timestamped_dir: bool,
    #[serde(default)]
    pub archive: bool,
    #[serde(default = "default_true")]
    pub summary: bool,
    #[serde(default = "default_owner_id")]
    pub owner_id: String,
    pub document_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSettings {
    pub path: Option<String>,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityConfig {
    pub facility_id: String,
    pub facility_display_name: String,
    pub source: String,
    pub demand_column: String,
    #[serde(default = "default_test_name_column")]
    pub test_name_column: String,
    #[serde(default)]
    pub zero_order_policy: bool,
    #[serde(default)]
    pub aggregate_duplicates: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    pub document_no: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub notes: String,
    pub output_file: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl FacilityConfig {
    pub fn policy(&self) -> AssemblyPolicy {
        AssemblyPolicy {
            apply_min_roundup: self.zero_order_policy,
            aggregate_duplicates: self.aggregate_duplicates,
        }
    }

    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(OrderError::InvalidConfigValueError {
                field: format!("facilities.{}.delimiter", self.facility_id),
                value: self.delimiter.clone(),
                reason: "Delimiter must be a single ASCII character".to_string(),
            }),
        }
    }

    /// 預設 "<facility_id>_SEVK.xml"，檔名中的路徑分隔字元會被替換
    pub fn output_file_name(&self) -> String {
        let name = self
            .output_file
            .clone()
            .unwrap_or_else(|| format!("{}_SEVK.xml", self.facility_id));
        name.chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c => c,
            })
            .collect()
    }
}

impl OrderConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(OrderError::IoError)?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| OrderError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DEMAND_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| OrderError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// 外部目錄檔與內嵌品項合併後載入；任一品項不合法即失敗
    pub fn load_catalog(&self) -> Result<Catalog> {
        let mut entries = Vec::new();

        if let Some(path) = &self.catalog.path {
            let full_path = self.resolve_path(path);
            let content = std::fs::read_to_string(&full_path).map_err(|e| {
                OrderError::ConfigError {
                    message: format!("Cannot read catalog {}: {}", full_path.display(), e),
                }
            })?;
            entries.extend(Catalog::parse_entries(&content)?);
        }
        entries.extend(self.catalog.products.iter().cloned());

        Catalog::from_entries(entries)
    }

    pub fn enabled_facilities(&self) -> impl Iterator<Item = &FacilityConfig> {
        self.facilities.iter().filter(|f| f.enabled)
    }
}

impl Validate for OrderConfig {
    fn validate(&self) -> Result<()> {
        validate_path("run.output_dir", &self.run.output_dir)?;
        validate_non_empty_string("run.owner_id", &self.run.owner_id)?;

        if let Some(date) = &self.run.document_date {
            if parse_document_date(date).is_none() {
                return Err(OrderError::InvalidConfigValueError {
                    field: "run.document_date".to_string(),
                    value: date.clone(),
                    reason: "Expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS".to_string(),
                });
            }
        }

        if self.catalog.path.is_none() && self.catalog.products.is_empty() {
            return Err(OrderError::MissingConfigError {
                field: "catalog.path or catalog.products".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for facility in &self.facilities {
            validate_non_empty_string("facilities.facility_id", &facility.facility_id)?;
            if !seen.insert(facility.facility_id.as_str()) {
                return Err(OrderError::InvalidConfigValueError {
                    field: "facilities.facility_id".to_string(),
                    value: facility.facility_id.clone(),
                    reason: "Duplicate facility id".to_string(),
                });
            }

            validate_non_empty_string(
                &format!("facilities.{}.demand_column", facility.facility_id),
                &facility.demand_column,
            )?;
            validate_non_empty_string(
                &format!("facilities.{}.test_name_column", facility.facility_id),
                &facility.test_name_column,
            )?;
            validate_path(
                &format!("facilities.{}.source", facility.facility_id),
                &facility.source,
            )?;
            validate_file_extensions(
                &format!("facilities.{}.source", facility.facility_id),
                std::slice::from_ref(&facility.source),
                &["csv", "tsv", "txt"],
            )?;
            facility.delimiter_byte()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[run]
output_dir = "./output"
document_date = "2025-10-01"

[[catalog.products]]
test_name = "TSH"
stock_code = "7K6230"
stock_name = "ARC.TSH (4*500 TEST)"
units_per_box = 2000
sets_per_box = 4

[[facilities]]
facility_id = "ARDAHAN"
facility_display_name = "ARDAHAN DEVLET HASTANESİ"
source = "ardahan.csv"
demand_column = "2,5 AYLIK İHTİYAÇ MİKTARI (TEST)"
document_no = "Sİ-0489"
"#;

    #[test]
    fn test_parse_basic_config() {
        let config = OrderConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.run.output_dir, "./output");
        assert!(config.run.timestamped_dir);
        assert!(!config.run.archive);
        assert_eq!(config.run.owner_id, "12600");

        let facility = &config.facilities[0];
        assert_eq!(facility.test_name_column, "TEST ADI");
        assert!(!facility.zero_order_policy);
        assert_eq!(facility.delimiter_byte().unwrap(), b',');
        assert_eq!(facility.output_file_name(), "ARDAHAN_SEVK.xml");
        assert!(config.validate().is_ok());

        let catalog = config.load_catalog().unwrap();
        assert!(catalog.lookup("TSH").is_some());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("REAGENT_ORDERS_TEST_OUT", "/tmp/orders");

        let content = BASIC.replace("./output", "${REAGENT_ORDERS_TEST_OUT}");
        let config = OrderConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.run.output_dir, "/tmp/orders");

        std::env::remove_var("REAGENT_ORDERS_TEST_OUT");
    }

    #[test]
    fn test_duplicate_facility_rejected() {
        let content = format!(
            "{}\n{}",
            BASIC,
            r#"
[[facilities]]
facility_id = "ARDAHAN"
facility_display_name = "Again"
source = "again.csv"
demand_column = "Miktar"
"#
        );
        let config = OrderConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_source_extension_and_delimiter() {
        let config = OrderConfig::from_toml_str(&BASIC.replace("ardahan.csv", "ardahan.xlsx"))
            .unwrap();
        assert!(config.validate().is_err());

        let content = BASIC.replace(
            "document_no = \"Sİ-0489\"",
            "document_no = \"Sİ-0489\"\ndelimiter = \";;\"",
        );
        let config = OrderConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_document_date_rejected() {
        let config =
            OrderConfig::from_toml_str(&BASIC.replace("2025-10-01", "01.10.2025")).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_file_name_is_sanitized() {
        let mut config = OrderConfig::from_toml_str(BASIC).unwrap();
        config.facilities[0].output_file = Some("../ARDAHAN/SEVK.xml".to_string());
        assert_eq!(config.facilities[0].output_file_name(), ".._ARDAHAN_SEVK.xml");
    }

    #[test]
    fn test_catalog_from_external_file() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("catalog.toml");
        std::fs::write(
            &catalog_path,
            r#"
[[products]]
test_name = "HbA1c"
stock_code = "4P5220"
stock_name = "HBA1C"
units_per_box = 100
"#,
        )
        .unwrap();

        let mut config_file = NamedTempFile::new_in(dir.path()).unwrap();
        let content = BASIC.replace("[run]", "[catalog]\npath = \"catalog.toml\"\n\n[run]");
        config_file.write_all(content.as_bytes()).unwrap();

        let config = OrderConfig::from_file(config_file.path()).unwrap();
        let catalog = config.load_catalog().unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.lookup("HbA1c").is_some());
    }
}
