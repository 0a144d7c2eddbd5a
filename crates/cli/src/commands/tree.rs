use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use manidx_engine::{FileIndexManager, FileTree, FileTreeNode};

use crate::{
    commands::{IndexOpt, finish, missing_index},
    printer::format_mtime,
};

#[derive(Debug, Args)]
pub struct TreeArgs {
    #[command(flatten)]
    pub index: IndexOpt,

    /// Manifest path to show; empty for the whole tree
    #[arg(default_value = "")]
    pub path: String,

    /// How many levels below PATH to print
    #[arg(long, short = 'd', default_value = "1")]
    pub depth: usize,
}

pub fn run(args: TreeArgs) -> ExitCode {
    finish("tree", execute(args))
}

fn execute(args: TreeArgs) -> Result<ExitCode> {
    let index_path = args.index.resolve();
    if !index_path.exists() {
        return Ok(missing_index("tree", &index_path));
    }

    let mut index = FileIndexManager::open(&index_path, false, None)
        .with_context(|| format!("Failed to open index at {}", index_path.display()))?;
    let tree = FileTree::from_index(&mut index, "")?;

    let Some(node) = tree.node_by_path(&args.path) else {
        eprintln!("[tree] {:?} is not in {}", args.path, index_path.display());
        return Ok(ExitCode::from(1));
    };

    let label = if args.path.is_empty() { "." } else { args.path.as_str() };
    println!("{}", describe(label, node));
    print_children(node, 1, args.depth);
    eprintln!("[tree] {} entries below {label}", node.descendant_count());

    Ok(ExitCode::SUCCESS)
}

fn describe(label: &str, node: &FileTreeNode) -> String {
    match node.info() {
        Some(info) if info.is_dir() => format!("{label}/  ({} entries)", info.nodes()),
        Some(info) => format!(
            "{label}  ({} bytes, {})",
            info.size(),
            format_mtime(info.mtime())
        ),
        None if node.has_children() => format!("{label}/"),
        None => label.to_string(),
    }
}

fn print_children(node: &FileTreeNode, level: usize, max_depth: usize) {
    if level > max_depth {
        return;
    }
    for child in node.children() {
        println!("{}{}", "  ".repeat(level), describe(child.name(), child));
        print_children(child, level + 1, max_depth);
    }
}
