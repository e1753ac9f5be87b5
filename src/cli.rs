use crate::assemble::{Diagram, Point};
use crate::config::load_config;
use crate::export::export_mermaid;
use crate::layout::LayoutStrategy;
use crate::{ImportOptions, import_mermaid};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mmc", version, about = "Mermaid import/export for design canvases")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mermaid text (.mmd, or .md with mermaid blocks) -> positioned canvas JSON
    Import(ImportArgs),
    /// Canvas JSON -> Mermaid text
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Input file (.mmd/.md) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output JSON file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Canvas point to centre the diagram on, as X,Y
    #[arg(long = "center", value_parser = parse_point, default_value = "0,0", allow_hyphen_values = true)]
    pub center: Point,

    /// Layout strategy (grid, flow, lane). Defaults per diagram type.
    #[arg(short = 's', long = "strategy")]
    pub strategy: Option<LayoutStrategy>,

    /// Config JSON file (spacing and shape dimensions)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Diagram JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output .mmd file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Import(args) => run_import(args),
        Command::Export(args) => run_export(args),
    }
}

fn run_import(args: ImportArgs) -> Result<()> {
    let options = ImportOptions {
        center: args.center,
        strategy: args.strategy,
        config: load_config(args.config.as_deref())?,
    };

    let (input, is_markdown) = read_input(args.input.as_deref())?;
    let sources = if is_markdown {
        extract_mermaid_blocks(&input)
    } else {
        vec![input]
    };
    if sources.is_empty() {
        return Err(anyhow::anyhow!("No Mermaid diagrams found in input"));
    }

    let diagrams = sources
        .iter()
        .enumerate()
        .map(|(idx, source)| {
            import_mermaid(source, &options).with_context(|| format!("diagram {}", idx + 1))
        })
        .collect::<Result<Vec<Diagram>>>()?;
    info!(count = diagrams.len(), "imported diagrams");

    let json = if let [diagram] = diagrams.as_slice() {
        serde_json::to_string_pretty(diagram)?
    } else {
        serde_json::to_string_pretty(&diagrams)?
    };
    write_output(&json, args.output.as_deref())
}

fn run_export(args: ExportArgs) -> Result<()> {
    let (input, _) = read_input(args.input.as_deref())?;
    let diagram: Diagram = serde_json::from_str(&input).context("invalid diagram JSON")?;
    let text = export_mermaid(&diagram)?;
    write_output(&text, args.output.as_deref())
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let is_md = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| matches!(ext, "md" | "markdown"))
            .unwrap_or(false);
        return Ok((content, is_md));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

fn write_output(contents: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            if !contents.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

fn parse_point(value: &str) -> Result<Point, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{value}'"))?;
    let coord = |part: &str| {
        part.trim()
            .parse::<f64>()
            .map_err(|err| format!("invalid coordinate '{}': {err}", part.trim()))
    };
    Ok(Point::new(coord(x)?, coord(y)?))
}

fn extract_mermaid_blocks(input: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut in_block = false;
    let mut current = Vec::new();
    let mut fence = "";

    for line in input.lines() {
        let trimmed = line.trim();
        if !in_block {
            if let Some(start_fence) = detect_mermaid_fence(trimmed) {
                in_block = true;
                fence = start_fence;
            }
            continue;
        }
        if is_fence_end(trimmed, fence) {
            in_block = false;
            blocks.push(current.join("\n"));
            current.clear();
            continue;
        }
        current.push(line);
    }

    blocks
}

fn detect_mermaid_fence(line: &str) -> Option<&'static str> {
    [("```", '`'), ("~~~", '~'), (":::", ':')]
        .into_iter()
        .find(|(fence, ch)| {
            line.strip_prefix(fence)
                .is_some_and(|rest| rest.trim_start_matches(*ch).trim().starts_with("mermaid"))
        })
        .map(|(fence, _)| fence)
}

fn is_fence_end(line: &str, fence: &str) -> bool {
    line.strip_prefix(fence)
        .is_some_and(|rest| rest.trim().is_empty())
}
