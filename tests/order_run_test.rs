use reagent_orders::core::etl::{FacilityStatus, ARCHIVE_FILE, SUMMARY_FILE};
use reagent_orders::utils::validation::Validate;
use reagent_orders::{LocalStorage, OrderConfig, OrderEngine, OrderError, RunContext};
use std::path::Path;
use tempfile::TempDir;

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
external_id = "7001"
units_per_box = 2000

[[products]]
test_name = "HbA1c"
stock_code = "4P5220"
stock_name = "HBA1C <R1&R2>"
units_per_box = 100
"#;

const CONFIG: &str = r#"
[run]
output_dir = "out"
timestamped_dir = false
archive = true
document_date = "2025-10-01 08:15:00"

[catalog]
path = "catalog.toml"

[[facilities]]
facility_id = "ARDAHAN"
facility_display_name = "ARDAHAN DEVLET HASTANESİ"
source = "sheets/ardahan.csv"
demand_column = "2,5 AYLIK İHTİYAÇ MİKTARI (TEST)"
delimiter = ";"
document_no = "Sİ-0489"
city = "ARDAHAN"
country = "TÜRKİYE"

[[facilities]]
facility_id = "KARS"
facility_display_name = "KARS DEVLET HASTANESİ"
source = "sheets/kars.csv"
demand_column = "IHTIYAC"

[[facilities]]
facility_id = "IGDIR"
facility_display_name = "IĞDIR DEVLET HASTANESİ"
source = "sheets/igdir.csv"
demand_column = "IHTIYAC"
"#;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn setup() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    write(root, "orders.toml", CONFIG);
    write(root, "catalog.toml", CATALOG);
    write(
        root,
        "sheets/ardahan.csv",
        "\u{feff}\"TEST ADI\";\"2,5 AYLIK İHTİYAÇ MİKTARI (TEST)\"\n\
         Glukoz (Serum/Plazma);7600\n\
         TSH ;2500,5\n\
         Ferritin;40\n\
         HbA1c;0\n",
    );
    write(root, "sheets/igdir.csv", "TEST ADI,IHTIYAC\nHbA1c,0\nFerritin,12\n");

    temp_dir
}

fn load(root: &Path) -> OrderConfig {
    let config = OrderConfig::from_file(root.join("orders.toml")).unwrap();
    config.validate().unwrap();
    config
}

fn started_at() -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2025, 10, 17)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

#[test]
fn test_end_to_end_order_run() {
    let temp_dir = setup();
    let root = temp_dir.path();
    let config = load(root);
    let catalog = config.load_catalog().unwrap();
    assert_eq!(catalog.len(), 3);

    let input = LocalStorage::new(config.base_dir.clone());
    let output = LocalStorage::new(config.resolve_path(&config.run.output_dir));
    let context = RunContext::new(started_at(), &config);

    let summary = OrderEngine::new(&input, &output, &catalog, &config, context)
        .run()
        .unwrap();

    // ARDAHAN 寫出，KARS 缺檔失敗，IGDIR 沒有可訂購的品項
    let ardahan = summary.outcome("ARDAHAN").unwrap();
    assert_eq!(ardahan.status, FacilityStatus::Written);
    assert_eq!(ardahan.lines, 2);
    assert_eq!(ardahan.skipped, 2);
    assert_eq!(summary.outcome("KARS").unwrap().status, FacilityStatus::Failed);
    assert_eq!(summary.outcome("IGDIR").unwrap().status, FacilityStatus::NoOutput);

    let out_dir = root.join("out");
    let xml = std::fs::read_to_string(out_dir.join("ARDAHAN_SEVK.xml")).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<FISNO>Sİ-0489</FISNO>"));
    assert!(xml.contains("<CARIADI>ARDAHAN DEVLET HASTANESİ</CARIADI>"));
    assert!(xml.contains("<FISTAR>45931</FISTAR>"));
    assert!(xml.contains("<FISSAAT>08:15:00</FISSAAT>"));

    // 7600 / 1500 每盒 5 組 → 26 組 = 5K + 1F
    assert!(xml.contains("<SIRANO>1</SIRANO>"));
    assert!(xml.contains("<MIKTAR>7800</MIKTAR>"));
    assert!(xml.contains("<OZELALAN1>5K + 1F</OZELALAN1>"));
    assert!(xml.contains("<ID>6464</ID>"));

    // 2500,5 無條件進位 → 2 盒
    assert!(xml.contains("<SIRANO>2</SIRANO>"));
    assert!(xml.contains("<MIKTAR>4000</MIKTAR>"));
    assert!(xml.contains("<OZELALAN1>2K</OZELALAN1>"));
    assert!(!xml.contains("<SIRANO>3</SIRANO>"));
    assert!(!xml.contains("HBA1C"));

    assert!(!out_dir.join("IGDIR_SEVK.xml").exists());
    assert!(!out_dir.join("KARS_SEVK.xml").exists());

    let archive_data = std::fs::read(out_dir.join(ARCHIVE_FILE)).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(archive_data)).unwrap();
    assert_eq!(archive.len(), 1);
    assert!(archive.by_name("ARDAHAN_SEVK.xml").is_ok());

    let summary_json: serde_json::Value = serde_json::from_slice(
        &std::fs::read(out_dir.join(SUMMARY_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(summary_json["facilities"].as_array().unwrap().len(), 3);
    assert_eq!(summary_json["facilities"][1]["status"], "failed");
}

#[test]
fn test_zero_order_policy_orders_one_box() -> anyhow::Result<()> {
    let temp_dir = setup();
    let root = temp_dir.path();
    write(
        root,
        "orders.toml",
        &CONFIG.replace(
            "source = \"sheets/igdir.csv\"",
            "source = \"sheets/igdir.csv\"\nzero_order_policy = true",
        ),
    );
    let config = load(root);
    let catalog = config.load_catalog()?;

    let input = LocalStorage::new(config.base_dir.clone());
    let output = LocalStorage::new(root.join("out"));
    let context = RunContext::new(started_at(), &config);

    let summary = OrderEngine::new(&input, &output, &catalog, &config, context)
        .with_facility_filter(vec!["IGDIR".to_string()])
        .run()?;

    assert_eq!(summary.facilities.len(), 1);
    assert_eq!(summary.facilities[0].status, FacilityStatus::Written);

    let xml = std::fs::read_to_string(root.join("out").join("IGDIR_SEVK.xml"))?;
    assert!(xml.contains("<MIKTAR>100</MIKTAR>"));
    assert!(xml.contains("<OZELALAN1>1K</OZELALAN1>"));
    assert!(xml.contains("<STOKADI>HBA1C &lt;R1&amp;R2&gt;</STOKADI>"));
    // 未對應的 Ferritin 不會出現
    assert!(!xml.contains("Ferritin"));
    Ok(())
}

#[test]
fn test_missing_demand_column_fails_only_that_facility() {
    let temp_dir = setup();
    let root = temp_dir.path();
    write(root, "sheets/kars.csv", "TEST ADI,MIKTAR\nTSH,100\n");
    let config = load(root);
    let catalog = config.load_catalog().unwrap();

    let input = LocalStorage::new(config.base_dir.clone());
    let output = LocalStorage::new(root.join("out"));
    let context = RunContext::new(started_at(), &config);

    let summary = OrderEngine::new(&input, &output, &catalog, &config, context)
        .run()
        .unwrap();

    let kars = summary.outcome("KARS").unwrap();
    assert_eq!(kars.status, FacilityStatus::Failed);
    assert!(kars.error.as_deref().unwrap().contains("IHTIYAC"));
    assert_eq!(summary.outcome("ARDAHAN").unwrap().status, FacilityStatus::Written);
}

#[test]
fn test_invalid_catalog_aborts_before_any_output() {
    let temp_dir = setup();
    let root = temp_dir.path();
    write(
        root,
        "catalog.toml",
        &CATALOG.replace("units_per_box = 100", "units_per_box = 0"),
    );
    let config = load(root);

    match config.load_catalog() {
        Err(e @ OrderError::CatalogLoad { .. }) => assert!(e.is_run_fatal()),
        other => panic!("expected catalog load error, got {other:?}"),
    }
    assert!(!root.join("out").exists());
}

#[test]
fn test_timestamped_run_directory() -> anyhow::Result<()> {
    let temp_dir = setup();
    let root = temp_dir.path();
    write(
        root,
        "orders.toml",
        &CONFIG.replace("timestamped_dir = false", "timestamped_dir = true"),
    );
    let config = load(root);
    let catalog = config.load_catalog()?;

    let input = LocalStorage::new(config.base_dir.clone());
    let output = LocalStorage::new(root.join("out"));
    let context = RunContext::new(started_at(), &config);

    let summary = OrderEngine::new(&input, &output, &catalog, &config, context).run()?;

    assert_eq!(
        summary.written_paths(),
        vec!["20251017_093000/ARDAHAN_SEVK.xml"]
    );
    let run_dir = root.join("out").join("20251017_093000");
    assert!(run_dir.join("ARDAHAN_SEVK.xml").exists());
    assert!(run_dir.join(ARCHIVE_FILE).exists());
    assert!(run_dir.join(SUMMARY_FILE).exists());
    Ok(())
}
