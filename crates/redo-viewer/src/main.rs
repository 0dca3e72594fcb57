use anyhow::{Context, Result};
use btree::{LogRecordSummary, summarize_batch};
use clap::{Parser, ValueEnum};
use common::{
    DEFAULT_PAGE_SIZE,
    pretty::{self, TableStyleKind},
    validate_page_size,
};
use log::debug;
use std::path::PathBuf;
use wal::Wal;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    validate_page_size(args.page_size)?;

    let batches = Wal::replay(&args.wal_path)
        .with_context(|| format!("failed to read redo log at {}", args.wal_path.display()))?;
    debug!("read {} batches from {}", batches.len(), args.wal_path.display());

    let mut records = Vec::new();
    for batch in &batches {
        let summary = summarize_batch(batch, args.page_size)
            .with_context(|| format!("failed to decode batch ending at lsn {}", batch.lsn))?;
        records.extend(summary);
    }

    let limited: Vec<LogRecordSummary> = records
        .into_iter()
        .filter(|rec| matches_page(args.page, rec))
        .skip(args.offset)
        .take(args.limit.unwrap_or(usize::MAX))
        .collect();

    if limited.is_empty() {
        println!("No matching redo records found.");
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => {
            let style: TableStyleKind = args.style.into();
            println!("{}", render_records(&limited, style));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&limited)?);
        }
    }

    Ok(())
}

fn matches_page(filter: Option<u32>, record: &LogRecordSummary) -> bool {
    filter.is_none_or(|page_no| record.page_no == page_no)
}

#[derive(Parser, Debug)]
#[command(name = "redo-viewer")]
#[command(about = "Inspect and pretty-print redo log records", long_about = None)]
struct Args {
    /// Path to the redo log file to inspect
    wal_path: PathBuf,
    /// Page size the log was written for
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,
    /// Filter records by page number
    #[arg(short, long)]
    page: Option<u32>,
    /// Output format (table or json)
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
    /// Style used for table rendering
    #[arg(long, value_enum, default_value_t = CliTableStyle::Modern)]
    style: CliTableStyle,
    /// Maximum number of records to display
    #[arg(long)]
    limit: Option<usize>,
    /// Number of matching records to skip before printing
    #[arg(long, default_value_t = 0)]
    offset: usize,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CliTableStyle {
    Modern,
    Ascii,
    Plain,
}

const REDO_HEADERS: [&str; 7] = ["LSN", "Offset", "Type", "Space", "Page", "Len", "Detail"];

impl From<CliTableStyle> for TableStyleKind {
    fn from(value: CliTableStyle) -> Self {
        match value {
            CliTableStyle::Modern => TableStyleKind::Modern,
            CliTableStyle::Ascii => TableStyleKind::Ascii,
            CliTableStyle::Plain => TableStyleKind::Plain,
        }
    }
}

fn render_records(records: &[LogRecordSummary], style: TableStyleKind) -> String {
    if records.is_empty() {
        return "<empty>".into();
    }

    let rows = records.iter().map(record_to_cells).collect();
    pretty::render_string_table(&REDO_HEADERS, rows, style)
}

fn record_to_cells(record: &LogRecordSummary) -> Vec<String> {
    let detail = if record.detail.is_empty() {
        "-".into()
    } else {
        record.detail.clone()
    };
    vec![
        record.lsn.to_string(),
        record.offset.to_string(),
        record.ty.clone(),
        record.space.to_string(),
        record.page_no.to_string(),
        record.len.to_string(),
        detail,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(page_no: u32, ty: &str, detail: &str) -> LogRecordSummary {
        LogRecordSummary {
            lsn: 42,
            offset: 0,
            ty: ty.into(),
            space: 0,
            page_no,
            len: 3,
            detail: detail.into(),
        }
    }

    #[test]
    fn page_filter_matches_page_numbers() {
        let rec = summary(3, "PAGE_CREATE", "");
        assert!(matches_page(None, &rec));
        assert!(matches_page(Some(3), &rec));
        assert!(!matches_page(Some(4), &rec));
    }

    #[test]
    fn empty_detail_renders_as_dash() {
        let cells = record_to_cells(&summary(3, "PAGE_CREATE", ""));
        assert_eq!(cells[2], "PAGE_CREATE");
        assert_eq!(cells[6], "-");
    }

    #[test]
    fn table_lists_every_record() {
        let rendered = render_records(
            &[
                summary(3, "REC_INSERT", "after rec 99: 1c0680000000000000012a"),
                summary(3, "REC_DELETE", "rec 126"),
            ],
            TableStyleKind::Ascii,
        );
        assert!(rendered.contains("REC_INSERT"));
        assert!(rendered.contains("rec 126"));
    }
}
