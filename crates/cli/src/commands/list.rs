use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use manidx_engine::{FileIndexManager, ListType};

use crate::{
    commands::{IndexOpt, finish, missing_index},
    printer::{ColorChoice, ListPrintContext, OutputFormat, PrinterConfig, make_printer},
};

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub index: IndexOpt,

    /// Which list to print: files, dirs, installer or delete
    #[arg(long, short = 'l', default_value = "files")]
    pub list: ListType,

    /// Skip this many records before printing
    #[arg(long, default_value = "0")]
    pub seek: u64,

    /// Maximum number of entries to print
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Output entries as NDJSON (one JSON object per line)
    #[arg(long)]
    pub json: bool,

    /// When to use colors: auto, always, never
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: String,
}

pub fn run(args: ListArgs) -> ExitCode {
    finish("list", execute(args))
}

fn execute(args: ListArgs) -> Result<ExitCode> {
    let index_path = args.index.resolve();
    if !index_path.exists() {
        return Ok(missing_index("list", &index_path));
    }

    let mut index = FileIndexManager::open(&index_path, false, None)
        .with_context(|| format!("Failed to open index at {}", index_path.display()))?;

    let location = index_path.display().to_string();
    let ctx = ListPrintContext {
        index: &location,
        list: args.list,
        total: index.count(args.list)?,
        seek: args.seek,
    };

    let mut printer = make_printer(PrinterConfig {
        format: if args.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        color: ColorChoice::parse(&args.color),
        limit: args.limit,
    });

    printer.begin(&ctx)?;
    for node in index.nodes(args.list, args.seek)? {
        if !printer.print_node(&node?, &ctx)? {
            break;
        }
    }
    printer.finish(&ctx)?;

    Ok(ExitCode::SUCCESS)
}
