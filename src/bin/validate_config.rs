//! Validate tool, toolbox and catalog YAML files.
//!
//! Usage:
//!   validate-config tools/buffer/tool.yml toolbox.yml
//!   validate-config --kind catalog workspace/catalogs/default.yml
//!
//! The kind is inferred from the file name unless `--kind` is given:
//! `toolbox.yml` is a toolbox descriptor, files under a `catalogs/`
//! directory are catalogs, everything else is a tool descriptor.

use anyhow::{Result, bail};
use clap::Parser;
use pytcatalog::CatalogService;
use pytcatalog::config::{TOOLBOX_DESCRIPTOR, load_tool_config, load_toolbox_config};
use pytcatalog::observability::init_tracing;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "validate-config")]
#[command(about = "Validate tool, toolbox and catalog YAML files")]
struct Cli {
    /// Force one kind for every file: tool, toolbox or catalog.
    #[arg(long, value_parser = ["tool", "toolbox", "catalog"])]
    kind: Option<String>,
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    init_tracing("warn");
    let cli = Cli::parse();

    let mut failures = 0usize;
    for path in &cli.paths {
        let kind = cli.kind.as_deref().unwrap_or_else(|| infer_kind(path));
        match check(kind, path) {
            Ok(()) => println!("OK {} ({kind})", path.display()),
            Err(message) => {
                failures += 1;
                println!("FAIL {} ({kind}): {message}", path.display());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} file(s) failed validation", cli.paths.len());
    }
    Ok(())
}

fn infer_kind(path: &Path) -> &'static str {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let in_catalogs = path
        .parent()
        .and_then(|p| p.file_name())
        .is_some_and(|n| n == "catalogs");
    if file_name == TOOLBOX_DESCRIPTOR {
        "toolbox"
    } else if in_catalogs {
        "catalog"
    } else {
        "tool"
    }
}

fn check(kind: &str, path: &Path) -> Result<(), String> {
    match kind {
        "toolbox" => load_toolbox_config(path)
            .map(|_| ())
            .map_err(|err| err.to_string()),
        "catalog" => {
            let root = path.parent().unwrap_or(Path::new("."));
            CatalogService::new(path, root)
                .load()
                .map(|_| ())
                .map_err(|err| err.to_string())
        }
        _ => load_tool_config(path)
            .map(|_| ())
            .map_err(|err| err.to_string()),
    }
}
