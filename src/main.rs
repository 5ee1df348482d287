use clap::Parser;
use reagent_orders::core::etl::FacilityStatus;
use reagent_orders::utils::error::ErrorSeverity;
use reagent_orders::utils::{logger, validation::Validate};
use reagent_orders::{CliConfig, LocalStorage, OrderConfig, OrderEngine, OrderError, RunContext};

fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(e: &OrderError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(e.severity()));
}

fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match OrderConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 命令列覆蓋的輸出目錄以目前工作目錄為準，設定檔中的以設定檔目錄為準
    if let Some(output_dir) = &args.output_dir {
        config.run.output_dir = output_dir.clone();
        tracing::info!("🔧 Output directory overridden to: {}", output_dir);
    }
    let output_root = match &args.output_dir {
        Some(output_dir) => std::path::PathBuf::from(output_dir),
        None => config.resolve_path(&config.run.output_dir),
    };

    if let Err(e) = config.validate() {
        fail(&e);
    }

    for id in &args.facilities {
        if !config.facilities.iter().any(|f| f.facility_id == *id) {
            tracing::warn!("⚠️ --facility {} does not match any configured facility", id);
        }
    }

    let catalog = match config.load_catalog() {
        Ok(catalog) => catalog,
        Err(e) => fail(&e),
    };
    tracing::info!("✅ Catalog loaded: {} products", catalog.len());

    let input = LocalStorage::new(config.base_dir.clone());
    let output = LocalStorage::new(output_root);
    let context = RunContext::new(chrono::Local::now().naive_local(), &config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be written");
    }

    let engine = OrderEngine::new(&input, &output, &catalog, &config, context)
        .with_dry_run(args.dry_run)
        .with_facility_filter(args.facilities.clone());

    match engine.run() {
        Ok(summary) => {
            for path in summary.written_paths() {
                println!("📁 {}", output.full_path(path).display());
            }
            if let Some(path) = &summary.archive_path {
                println!("📦 {}", output.full_path(path).display());
            }

            let failed = summary.count(FacilityStatus::Failed);
            println!(
                "✅ {} purchase orders written, {} facilities without output, {} failed",
                summary.count(FacilityStatus::Written),
                summary.count(FacilityStatus::NoOutput),
                failed
            );
            if failed > 0 {
                std::process::exit(exit_code(ErrorSeverity::Medium));
            }
        }
        Err(e) => fail(&e),
    }

    Ok(())
}
