use clap::Parser;
use reagent_orders::adapters::demand_sheet::{read_demand_rows, write_totals_csv, SheetLayout};
use reagent_orders::core::assembler::aggregate_rows;
use reagent_orders::utils::logger;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "demand-totals")]
#[command(about = "Sum a demand sheet's quantity column per test name")]
struct Args {
    /// Demand sheet exported as CSV
    input: PathBuf,

    /// Column holding the (repeating) test names
    #[arg(long, default_value = "S/H/M Adı")]
    name_column: String,

    /// Column holding the quantities to sum
    #[arg(long, default_value = "Miktar")]
    quantity_column: String,

    #[arg(long, default_value = ",")]
    delimiter: char,

    /// Output CSV, defaults to <input>_totals.csv
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if !args.delimiter.is_ascii() {
        anyhow::bail!("delimiter must be a single ASCII character");
    }
    let layout = SheetLayout::new(&args.name_column, &args.quantity_column)
        .with_delimiter(args.delimiter as u8);

    let data = std::fs::read(&args.input)?;
    let rows = read_demand_rows(&data, &layout)?;
    tracing::info!("Read {} rows from {}", rows.len(), args.input.display());

    let aggregated = aggregate_rows(rows);
    for skipped in &aggregated.skipped {
        tracing::warn!(
            "⚠️ Row {} '{}' left out of the total: {}",
            skipped.row_number,
            skipped.test_name,
            skipped.reason
        );
    }
    let totals = aggregated.totals;
    for row in &totals {
        tracing::info!(
            "  {} = {}",
            row.test_name,
            row.raw_quantity.as_deref().unwrap_or("0")
        );
    }

    let output = args.output.unwrap_or_else(|| {
        let stem = args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "demand".to_string());
        args.input.with_file_name(format!("{}_totals.csv", stem))
    });
    std::fs::write(&output, write_totals_csv(&totals, &layout)?)?;

    println!("✅ {} tests summed into {}", totals.len(), output.display());
    Ok(())
}
