//! 需求表（試算表匯出的 CSV）讀取

use crate::domain::model::DemandRow;
use crate::utils::error::{OrderError, Result};
use csv::ReaderBuilder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub test_name_column: String,
    pub demand_column: String,
    pub delimiter: u8,
}

impl SheetLayout {
    pub fn new(test_name_column: &str, demand_column: &str) -> Self {
        Self {
            test_name_column: test_name_column.to_string(),
            demand_column: demand_column.to_string(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// 標題去除前後空白、引號與 BOM
pub fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .replace('"', "")
        .trim()
        .to_string()
}

fn column_index(headers: &[String], column: &str) -> Result<usize> {
    let wanted = normalize_header(column);
    headers
        .iter()
        .position(|h| *h == wanted)
        .ok_or_else(|| OrderError::MissingColumn { column: wanted })
}

/// 依欄位名稱取出（測試名稱、需求量）；測試名稱空白的列視為空列忽略
pub fn read_demand_rows(data: &[u8], layout: &SheetLayout) -> Result<Vec<DemandRow>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(layout.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let name_idx = column_index(&headers, &layout.test_name_column)?;
    let demand_idx = column_index(&headers, &layout.demand_column)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let test_name = record.get(name_idx).unwrap_or("").trim();
        if test_name.is_empty() {
            continue;
        }

        let raw_quantity = record
            .get(demand_idx)
            .map(str::trim)
            .filter(|value| !value.is_empty());

        rows.push(DemandRow::new(test_name, raw_quantity).at_row(idx + 1));
    }

    tracing::debug!(
        "Read {} demand rows (columns '{}', '{}')",
        rows.len(),
        layout.test_name_column,
        layout.demand_column
    );
    Ok(rows)
}

/// 兩欄的加總表：<測試名稱欄>, Toplam <數量欄>；沒有數值的測試記為 0
pub fn write_totals_csv(totals: &[DemandRow], layout: &SheetLayout) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(layout.delimiter)
        .from_writer(Vec::new());

    writer.write_record([
        layout.test_name_column.as_str(),
        format!("Toplam {}", layout.demand_column).as_str(),
    ])?;
    for row in totals {
        writer.write_record([
            row.test_name.as_str(),
            row.raw_quantity.as_deref().unwrap_or("0"),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| OrderError::IoError(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_rows_by_column_name() {
        // 欄位名稱含逗號，所以用分號分隔
        let data = "\u{feff}SIRA; \"TEST ADI\" ;2,5 AYLIK\n1;Glukoz (Serum/Plazma) ;7600\n2;TSH;\n3;;5\n";
        let layout = SheetLayout::new("TEST ADI", "2,5 AYLIK").with_delimiter(b';');

        let rows = read_demand_rows(data.as_bytes(), &layout).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].test_name, "Glukoz (Serum/Plazma)");
        assert_eq!(rows[0].raw_quantity.as_deref(), Some("7600"));
        assert_eq!(rows[1].test_name, "TSH");
        assert_eq!(rows[1].raw_quantity, None);
        assert_eq!(rows[0].source_row, Some(1));
        assert_eq!(rows[1].source_row, Some(2));
    }

    #[test]
    fn test_blank_name_rows_keep_source_numbering() {
        let data = "TEST ADI,Q
,5
,5
Ferritin,10
";
        let layout = SheetLayout::new("TEST ADI", "Q");

        let rows = read_demand_rows(data.as_bytes(), &layout).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].test_name, "Ferritin");
        assert_eq!(rows[0].source_row, Some(3));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let data = "TEST ADI,Miktar\nTSH,10\n";
        let layout = SheetLayout::new("TEST ADI", "IHTIYAC");

        match read_demand_rows(data.as_bytes(), &layout) {
            Err(OrderError::MissingColumn { column }) => assert_eq!(column, "IHTIYAC"),
            other => panic!("expected missing column, got {other:?}"),
        }
    }

    #[test]
    fn test_write_totals_csv() {
        let layout = SheetLayout::new("S/H/M Adı", "Miktar");
        let totals = vec![
            DemandRow::new("TSH", Some("12")),
            DemandRow::new("Ferritin", None),
        ];

        let bytes = write_totals_csv(&totals, &layout).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "S/H/M Adı,Toplam Miktar\nTSH,12\nFerritin,0\n"
        );
    }

    #[test]
    fn test_short_rows_have_no_quantity() {
        let data = "TEST ADI,Miktar,Not\nTSH\nHbA1c,12,x\n";
        let layout = SheetLayout::new("TEST ADI", "Miktar");

        let rows = read_demand_rows(data.as_bytes(), &layout).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].raw_quantity, None);
        assert_eq!(rows[1].raw_quantity.as_deref(), Some("12"));
    }
}
