use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Catalog entry '{test_name}' is invalid: {reason}")]
    CatalogLoad { test_name: String, reason: String },

    #[error("Facility '{facility_id}' failed: {message}")]
    FacilityIo { facility_id: String, message: String },

    #[error("Demand of {demand} for '{test_name}' resolved to an empty package")]
    ResolverInvariant { test_name: String, demand: String },

    #[error("Column '{column}' not found in source sheet")]
    MissingColumn { column: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Catalog,
    Configuration,
    Facility,
    Logic,
    Io,
}

impl OrderError {
    pub fn facility_io(facility_id: &str, message: impl Into<String>) -> Self {
        Self::FacilityIo {
            facility_id: facility_id.to_string(),
            message: message.into(),
        }
    }

    /// 將任意錯誤包成單一院所的錯誤（不中斷其他院所）
    pub fn for_facility(self, facility_id: &str) -> Self {
        match self {
            Self::FacilityIo { .. } | Self::ResolverInvariant { .. } | Self::CatalogLoad { .. } => {
                self
            }
            other => Self::facility_io(facility_id, other.to_string()),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CatalogLoad { .. } => ErrorCategory::Catalog,
            Self::FacilityIo { .. } | Self::MissingColumn { .. } => ErrorCategory::Facility,
            Self::ResolverInvariant { .. } => ErrorCategory::Logic,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::ZipError(_) | Self::CsvError(_) | Self::IoError(_) | Self::SerializationError(_) => {
                ErrorCategory::Io
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::FacilityIo { .. } | Self::MissingColumn { .. } => ErrorSeverity::Medium,
            Self::ZipError(_) | Self::CsvError(_) | Self::IoError(_) | Self::SerializationError(_) => {
                ErrorSeverity::Medium
            }
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorSeverity::High,
            Self::CatalogLoad { .. } | Self::ResolverInvariant { .. } => ErrorSeverity::Critical,
        }
    }

    /// 只有目錄錯誤與換算不變量被破壞會中止整批執行
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::CatalogLoad { .. } | Self::ResolverInvariant { .. }
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::CatalogLoad { test_name, reason } => {
                format!("The product catalog could not be loaded ({}: {})", test_name, reason)
            }
            Self::FacilityIo {
                facility_id,
                message,
            } => format!("Facility {} produced no order: {}", facility_id, message),
            Self::ResolverInvariant { test_name, .. } => format!(
                "Internal error while converting demand for '{}'; the run was stopped",
                test_name
            ),
            Self::ConfigError { message } => format!("Configuration problem: {}", message),
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration field '{}' is invalid: {}", field, reason)
            }
            Self::MissingConfigError { field } => {
                format!("Configuration field '{}' is required", field)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Catalog => {
                "Check units_per_box/sets_per_box and test names in the catalog"
            }
            ErrorCategory::Configuration => "Review the TOML configuration file",
            ErrorCategory::Facility => {
                "Check the facility's source file and column names, then rerun"
            }
            ErrorCategory::Logic => "Report this as a bug together with the catalog entry",
            ErrorCategory::Io => "Check file paths and permissions",
        }
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;
