use crate::adapters::archive;
use crate::config::order_config::{FacilityConfig, OrderConfig};
use crate::core::catalog::Catalog;
use crate::core::pipeline::FacilityPipeline;
use crate::domain::model::FacilityOrder;
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::dates::parse_document_date;
use crate::utils::error::{OrderError, Result};
use chrono::NaiveDateTime;
use serde::Serialize;

pub const ARCHIVE_FILE: &str = "purchase_orders.zip";
pub const SUMMARY_FILE: &str = "run_summary.json";

/// 單次執行的上下文（時間戳與輸出子目錄）
#[derive(Debug, Clone)]
pub struct RunContext {
    pub started_at: NaiveDateTime,
    /// 表頭使用的文件日期時間
    pub document_time: NaiveDateTime,
    /// 相對於輸出根目錄的子目錄，空字串表示直接寫在根目錄
    pub run_dir: String,
    pub owner_id: String,
}

impl RunContext {
    pub fn new(started_at: NaiveDateTime, config: &OrderConfig) -> Self {
        let document_time = config
            .run
            .document_date
            .as_deref()
            .and_then(parse_document_date)
            .unwrap_or(started_at);

        let run_dir = if config.run.timestamped_dir {
            started_at.format("%Y%m%d_%H%M%S").to_string()
        } else {
            String::new()
        };

        Self {
            started_at,
            document_time,
            run_dir,
            owner_id: config.run.owner_id.clone(),
        }
    }

    pub fn output_file_path(&self, file_name: &str) -> String {
        if self.run_dir.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.run_dir, file_name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilityStatus {
    Written,
    NoOutput,
    DryRun,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacilityOutcome {
    pub facility_id: String,
    pub status: FacilityStatus,
    pub lines: usize,
    pub skipped: usize,
    pub output_path: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub facilities: Vec<FacilityOutcome>,
    pub archive_path: Option<String>,
}

impl RunSummary {
    pub fn count(&self, status: FacilityStatus) -> usize {
        self.facilities.iter().filter(|f| f.status == status).count()
    }

    pub fn written_paths(&self) -> Vec<&str> {
        self.facilities
            .iter()
            .filter_map(|f| f.output_path.as_deref())
            .collect()
    }

    pub fn outcome(&self, facility_id: &str) -> Option<&FacilityOutcome> {
        self.facilities.iter().find(|f| f.facility_id == facility_id)
    }
}

/// 依序處理每個院所；單一院所失敗只記錄，不影響其他院所
pub struct OrderEngine<'a, S: Storage> {
    input: &'a S,
    output: &'a S,
    catalog: &'a Catalog,
    config: &'a OrderConfig,
    context: RunContext,
    dry_run: bool,
    only: Vec<String>,
}

impl<'a, S: Storage> OrderEngine<'a, S> {
    pub fn new(
        input: &'a S,
        output: &'a S,
        catalog: &'a Catalog,
        config: &'a OrderConfig,
        context: RunContext,
    ) -> Self {
        Self {
            input,
            output,
            catalog,
            config,
            context,
            dry_run: false,
            only: Vec::new(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 只處理指定院所；空清單表示全部
    pub fn with_facility_filter(mut self, only: Vec<String>) -> Self {
        self.only = only;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    fn selected(&self, facility: &FacilityConfig) -> bool {
        self.only.is_empty() || self.only.iter().any(|id| *id == facility.facility_id)
    }

    pub fn run(&self) -> Result<RunSummary> {
        self.run_with(|facility| {
            FacilityPipeline::new(
                self.input,
                self.output,
                self.catalog,
                facility,
                &self.context,
            )
        })
    }

    /// 每個院所用 `build` 建立自己的 pipeline
    fn run_with<P, F>(&self, build: F) -> Result<RunSummary>
    where
        P: Pipeline,
        F: Fn(&'a FacilityConfig) -> P,
    {
        tracing::info!(
            "🚀 Starting order run ({} products in catalog)",
            self.catalog.len()
        );

        let config: &'a OrderConfig = self.config;
        let mut outcomes = Vec::new();

        for facility in config.enabled_facilities().filter(|f| self.selected(f)) {
            tracing::info!("🏥 Processing facility {}", facility.facility_id);
            let pipeline = build(facility);
            outcomes.push(self.dispatch(&pipeline, facility)?);
        }

        let mut summary = RunSummary {
            started_at: self.context.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            facilities: outcomes,
            archive_path: None,
        };

        if !self.dry_run {
            self.write_artifacts(&mut summary);
        }

        log_summary(&summary);
        Ok(summary)
    }

    /// 只有會中止整次執行的錯誤往上傳；其餘記為失敗的院所
    fn dispatch<P: Pipeline>(
        &self,
        pipeline: &P,
        facility: &FacilityConfig,
    ) -> Result<FacilityOutcome> {
        match self.run_facility(pipeline, facility) {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_run_fatal() => {
                tracing::error!(
                    "❌ Facility {} hit a fatal error, stopping run: {}",
                    facility.facility_id,
                    e
                );
                Err(e)
            }
            Err(e) => {
                let e = e.for_facility(&facility.facility_id);
                tracing::error!("❌ {}", e);
                tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
                Ok(FacilityOutcome {
                    facility_id: facility.facility_id.clone(),
                    status: FacilityStatus::Failed,
                    lines: 0,
                    skipped: 0,
                    output_path: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    fn run_facility<P: Pipeline>(
        &self,
        pipeline: &P,
        facility: &FacilityConfig,
    ) -> Result<FacilityOutcome> {
        let rows = pipeline.extract()?;
        tracing::debug!("[{}] Extracted {} rows", facility.facility_id, rows.len());

        let order = pipeline.transform(rows)?;
        let mut outcome = FacilityOutcome {
            facility_id: facility.facility_id.clone(),
            status: FacilityStatus::NoOutput,
            lines: order.lines.len(),
            skipped: order.skipped.len(),
            output_path: None,
            error: None,
        };

        if order.is_empty() {
            tracing::warn!(
                "⚠️ Facility {} has no orderable lines, no document produced",
                facility.facility_id
            );
            return Ok(outcome);
        }

        if self.dry_run {
            log_order(&order);
            outcome.status = FacilityStatus::DryRun;
            return Ok(outcome);
        }

        if let Some(path) = pipeline.load(&order)? {
            tracing::info!(
                "✅ Facility {}: {} lines written to {}",
                facility.facility_id,
                order.lines.len(),
                path
            );
            outcome.status = FacilityStatus::Written;
            outcome.output_path = Some(path);
        }

        Ok(outcome)
    }

    /// 壓縮檔與摘要檔；失敗只記錄，已寫出的訂單不受影響
    fn write_artifacts(&self, summary: &mut RunSummary) {
        if self.config.run.archive && summary.count(FacilityStatus::Written) > 0 {
            match self.build_archive(summary) {
                Ok(path) => {
                    tracing::info!("📦 Archive saved to {}", path);
                    summary.archive_path = Some(path);
                }
                Err(e) => tracing::error!("❌ Failed to build archive: {}", e),
            }
        }

        if self.config.run.summary {
            let path = self.context.output_file_path(SUMMARY_FILE);
            let written = serde_json::to_vec_pretty(summary)
                .map_err(OrderError::from)
                .and_then(|json| self.output.write_file(&path, &json));
            if let Err(e) = written {
                tracing::error!("❌ Failed to write run summary: {}", e);
            }
        }
    }

    fn build_archive(&self, summary: &RunSummary) -> Result<String> {
        let mut files = Vec::new();
        for path in summary.written_paths() {
            let data = self.output.read_file(path)?;
            let name = path.rsplit('/').next().unwrap_or(path).to_string();
            files.push((name, data));
        }

        let bytes = archive::bundle(&files)?;
        let path = self.context.output_file_path(ARCHIVE_FILE);
        self.output.write_file(&path, &bytes)?;
        Ok(path)
    }
}

fn log_order(order: &FacilityOrder) {
    for line in &order.lines {
        tracing::info!(
            "  {:>3}. {} {} -> {} ({} {})",
            line.line_number,
            line.descriptor.stock_code,
            line.descriptor.test_name,
            line.resolved.package_label,
            line.quantity(),
            line.descriptor.unit_code
        );
    }
}

fn log_summary(summary: &RunSummary) {
    tracing::info!(
        "📋 Run finished: {} written, {} without output, {} failed, {} dry-run",
        summary.count(FacilityStatus::Written),
        summary.count(FacilityStatus::NoOutput),
        summary.count(FacilityStatus::Failed),
        summary.count(FacilityStatus::DryRun)
    );
    for outcome in &summary.facilities {
        match outcome.status {
            FacilityStatus::Written => tracing::info!(
                "  ✅ {}: {} lines, {} skipped -> {}",
                outcome.facility_id,
                outcome.lines,
                outcome.skipped,
                outcome.output_path.as_deref().unwrap_or("")
            ),
            FacilityStatus::DryRun => tracing::info!(
                "  🔍 {}: {} lines, {} skipped (not written)",
                outcome.facility_id,
                outcome.lines,
                outcome.skipped
            ),
            FacilityStatus::NoOutput => tracing::warn!(
                "  ⚠️ {}: no output ({} rows skipped)",
                outcome.facility_id,
                outcome.skipped
            ),
            FacilityStatus::Failed => tracing::error!(
                "  ❌ {}: {}",
                outcome.facility_id,
                outcome.error.as_deref().unwrap_or("failed")
            ),
        }
    }
}
