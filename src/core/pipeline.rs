use crate::adapters::demand_sheet::{read_demand_rows, SheetLayout};
use crate::adapters::xml::render_purchase_order;
use crate::config::order_config::FacilityConfig;
use crate::core::assembler::OrderAssembler;
use crate::core::catalog::Catalog;
use crate::core::etl::RunContext;
use crate::domain::model::{DemandRow, FacilityOrder, OrderHeader};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::dates::{clock_time, excel_serial_date};
use crate::utils::error::Result;

/// 單一院所：讀需求表 → 換算 → 寫出 XML
pub struct FacilityPipeline<'a, S: Storage> {
    input: &'a S,
    output: &'a S,
    catalog: &'a Catalog,
    facility: &'a FacilityConfig,
    context: &'a RunContext,
}

impl<'a, S: Storage> FacilityPipeline<'a, S> {
    pub fn new(
        input: &'a S,
        output: &'a S,
        catalog: &'a Catalog,
        facility: &'a FacilityConfig,
        context: &'a RunContext,
    ) -> Self {
        Self {
            input,
            output,
            catalog,
            facility,
            context,
        }
    }

    pub fn header(&self) -> OrderHeader {
        let document_no = self.facility.document_no.clone().unwrap_or_else(|| {
            format!("SI-{}", self.context.started_at.format("%y%m%d%H%M"))
        });

        OrderHeader {
            owner_id: self.context.owner_id.clone(),
            document_no,
            facility_id: self.facility.facility_id.clone(),
            facility_display_name: self.facility.facility_display_name.clone(),
            city: self.facility.city.clone(),
            country: self.facility.country.clone(),
            notes: self.facility.notes.clone(),
            document_date: excel_serial_date(self.context.document_time.date()).to_string(),
            document_time: clock_time(&self.context.document_time),
        }
    }

    /// 輸出檔相對於輸出根目錄的路徑
    pub fn output_path(&self) -> String {
        self.context.output_file_path(&self.facility.output_file_name())
    }
}

impl<S: Storage> Pipeline for FacilityPipeline<'_, S> {
    fn extract(&self) -> Result<Vec<DemandRow>> {
        tracing::debug!(
            "[{}] Reading demand sheet {}",
            self.facility.facility_id,
            self.facility.source
        );
        let data = self.input.read_file(&self.facility.source)?;
        let layout = SheetLayout::new(&self.facility.test_name_column, &self.facility.demand_column)
            .with_delimiter(self.facility.delimiter_byte()?);
        read_demand_rows(&data, &layout)
    }

    fn transform(&self, rows: Vec<DemandRow>) -> Result<FacilityOrder> {
        OrderAssembler::new(self.catalog, self.facility.policy())
            .assemble(&self.facility.facility_id, rows)
    }

    fn load(&self, order: &FacilityOrder) -> Result<Option<String>> {
        if order.is_empty() {
            return Ok(None);
        }

        let xml = render_purchase_order(&self.header(), &order.lines);
        let path = self.output_path();
        self.output.write_file(&path, xml.as_bytes())?;

        tracing::debug!("[{}] Wrote {} bytes to {}", order.facility_id, xml.len(), path);
        Ok(Some(path))
    }
}
