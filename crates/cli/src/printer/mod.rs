use std::io::{self, Write};

use chrono::{DateTime, Local, Utc};
use manidx_engine::{FileNodeInfo, ListType, MTIME_UNSET, NodeType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable columns with optional colors.
    #[default]
    Human,
    /// NDJSON (newline-delimited JSON) for machine consumption.
    Json,
}

/// Color handling strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorChoice {
    /// Enable colors when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn parse(s: &str) -> Self {
        match s {
            "always" => ColorChoice::Always,
            "never" => ColorChoice::Never,
            _ => ColorChoice::Auto,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub format: OutputFormat,
    pub color: ColorChoice,
    /// Maximum number of entries to print; `None` prints everything.
    pub limit: Option<usize>,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Human,
            color: ColorChoice::Auto,
            limit: None,
        }
    }
}

/// Static context about one listing.
#[derive(Debug)]
pub struct ListPrintContext<'a> {
    pub index: &'a str,
    pub list: ListType,
    /// Entries in the list, before `seek` and `limit`.
    pub total: u64,
    pub seek: u64,
}

/// Receives a stream of manifest entries.
pub trait NodePrinter {
    fn begin(&mut self, ctx: &ListPrintContext) -> io::Result<()>;

    /// Called for each entry; returns `false` once the limit is reached.
    fn print_node(&mut self, node: &FileNodeInfo, ctx: &ListPrintContext) -> io::Result<bool>;

    fn finish(&mut self, ctx: &ListPrintContext) -> io::Result<()>;
}

pub fn make_printer(cfg: PrinterConfig) -> Box<dyn NodePrinter> {
    match cfg.format {
        OutputFormat::Human => Box::new(HumanPrinter::<io::Stdout, io::Stderr>::stdout(cfg)),
        OutputFormat::Json => Box::new(JsonPrinter::new(io::stdout(), cfg)),
    }
}

/// `YYYY-mm-dd HH:MM:SS` in local time, or `-` when unset.
pub fn format_mtime(mtime: i64) -> String {
    if mtime == MTIME_UNSET {
        return "-".to_string();
    }
    DateTime::<Utc>::from_timestamp(mtime, 0)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn type_marker(node_type: NodeType) -> char {
    match node_type {
        NodeType::File => 'f',
        NodeType::Dir => 'd',
        NodeType::LinkFile | NodeType::LinkDir => 'l',
        NodeType::Unknown => '?',
    }
}

pub struct HumanPrinter<W: Write, E: Write> {
    out: W,
    err: E,
    cfg: PrinterConfig,
    use_color: bool,
    printed: usize,
}

impl<W: Write, E: Write> HumanPrinter<W, E> {
    /// Colors are only used with `ColorChoice::Always` here; the caller
    /// cannot be probed for a terminal.
    pub fn new(out: W, err: E, cfg: PrinterConfig) -> Self {
        let use_color = cfg.color == ColorChoice::Always;
        Self {
            out,
            err,
            cfg,
            use_color,
            printed: 0,
        }
    }

    pub fn stdout(cfg: PrinterConfig) -> HumanPrinter<io::Stdout, io::Stderr> {
        use std::io::IsTerminal;

        let use_color = match cfg.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        };

        HumanPrinter {
            out: io::stdout(),
            err: io::stderr(),
            cfg,
            use_color,
            printed: 0,
        }
    }

    #[inline]
    fn format_path(&self, node: &FileNodeInfo) -> String {
        if self.use_color && node.is_dir() {
            format!("\x1b[34m{}\x1b[0m", node.path())
        } else {
            node.path().to_owned()
        }
    }
}

impl<W: Write, E: Write> NodePrinter for HumanPrinter<W, E> {
    fn begin(&mut self, _ctx: &ListPrintContext) -> io::Result<()> {
        Ok(())
    }

    fn print_node(&mut self, node: &FileNodeInfo, _ctx: &ListPrintContext) -> io::Result<bool> {
        if self.cfg.limit.is_some_and(|limit| self.printed >= limit) {
            return Ok(false);
        }

        let path = self.format_path(node);
        let extra = if node.is_dir() {
            format!("{} entries", node.nodes())
        } else {
            node.hash().to_owned()
        };
        writeln!(
            self.out,
            "{} {:>12} {:<19} {:<12} {}",
            type_marker(node.node_type()),
            node.size(),
            format_mtime(node.mtime()),
            extra,
            path
        )?;
        self.printed += 1;
        Ok(true)
    }

    fn finish(&mut self, ctx: &ListPrintContext) -> io::Result<()> {
        let shown = self.printed as u64;
        let remaining = ctx.total.saturating_sub(ctx.seek).saturating_sub(shown);
        if remaining > 0 {
            writeln!(self.out, "... and {} more entries", remaining)?;
        }
        writeln!(
            self.err,
            "\n[list] {}: {} of {} entries in {}",
            ctx.list, shown, ctx.total, ctx.index
        )
    }
}

pub struct JsonPrinter<W: Write> {
    out: W,
    cfg: PrinterConfig,
    printed: usize,
}

impl<W: Write> JsonPrinter<W> {
    pub fn new(out: W, cfg: PrinterConfig) -> Self {
        Self {
            out,
            cfg,
            printed: 0,
        }
    }
}

impl<W: Write> NodePrinter for JsonPrinter<W> {
    fn begin(&mut self, _ctx: &ListPrintContext) -> io::Result<()> {
        Ok(())
    }

    fn print_node(&mut self, node: &FileNodeInfo, ctx: &ListPrintContext) -> io::Result<bool> {
        if self.cfg.limit.is_some_and(|limit| self.printed >= limit) {
            return Ok(false);
        }

        let obj = serde_json::json!({
            "list": ctx.list,
            "node": node,
        });
        writeln!(self.out, "{}", obj)?;
        self.printed += 1;
        Ok(true)
    }

    fn finish(&mut self, ctx: &ListPrintContext) -> io::Result<()> {
        let obj = serde_json::json!({
            "type": "summary",
            "list": ctx.list,
            "total": ctx.total,
            "seek": ctx.seek,
            "printed": self.printed,
        });
        writeln!(self.out, "{}", obj)
    }
}

#[cfg(test)]
#[path = "printer_tests.rs"]
mod tests;
