//! Manage a toolbox catalog and generate `.pyt` files from it.
//!
//! Usage:
//!   pytcatalog init
//!   pytcatalog source add s1 "Shared tools" --type local --path /srv/tools
//!   pytcatalog toolbox add tb1 "Analysis" analysis.pyt
//!   pytcatalog tool add tb1 s1 tools/buffer
//!   pytcatalog generate tb1

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use pytcatalog::catalog::model::SourceLocation;
use pytcatalog::observability::init_tracing;
use pytcatalog::{
    CatalogService, DiscoveryService, GeneratorService, NewSource, ScanOutcome, Settings,
    SourceType, SourceUpdate, ToolReferenceUpdate, ToolboxUpdate, split_list,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pytcatalog")]
#[command(about = "Catalog ArcGIS Pro tools across sources and generate Python toolboxes")]
struct Cli {
    /// Catalog file (default: <workspace>/catalogs/default.yml).
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    /// Workspace root (default: $PYTCATALOG_WORKSPACE or ./workspace).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty catalog and the workspace layout.
    Init {
        /// Replace an existing catalog (the old file is backed up).
        #[arg(long)]
        overwrite: bool,
    },
    /// Manage tool sources.
    #[command(subcommand)]
    Source(SourceCommand),
    /// Manage catalog toolboxes.
    #[command(subcommand)]
    Toolbox(ToolboxCommand),
    /// Manage the tools assigned to a toolbox.
    #[command(subcommand)]
    Tool(ToolCommand),
    /// Scan sources for tool and toolbox descriptors.
    Scan {
        /// Comma or space separated source ids; all enabled sources when omitted.
        sources: Option<String>,
    },
    /// Report workspace problems and dangling tool references.
    Check,
    /// Resolve every tool of a toolbox without writing anything.
    Validate { toolbox: String },
    /// Generate one toolbox.
    Generate {
        toolbox: String,
        /// Output `.pyt` path (default: the toolbox path, under <workspace>/toolboxes when relative).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Skip the `.pyt.xml` metadata file.
        #[arg(long)]
        no_metadata: bool,
    },
    /// Generate every toolbox to `<dir>/<id>.pyt`.
    GenerateAll {
        /// Output directory (default: <workspace>/toolboxes).
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        no_metadata: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SourceCommand {
    Add {
        id: String,
        name: String,
        #[arg(long = "type", value_parser = ["local", "network", "git"])]
        kind: String,
        #[command(flatten)]
        location: LocationArgs,
        /// Register the source disabled.
        #[arg(long)]
        disabled: bool,
    },
    Remove {
        id: String,
        /// Remove even when toolboxes still reference the source.
        #[arg(long)]
        force: bool,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        location: LocationArgs,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
    List {
        #[arg(long)]
        enabled_only: bool,
    },
}

#[derive(Args, Debug)]
struct LocationArgs {
    /// Directory for local and network sources.
    #[arg(long)]
    path: Option<PathBuf>,
    /// Repository URL for git sources.
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    branch: Option<String>,
    /// Mirror directory for git sources (default: <workspace>/sources/<id>).
    #[arg(long)]
    local_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ToolboxCommand {
    Add {
        id: String,
        name: String,
        /// Output path; must end in `.pyt`.
        path: PathBuf,
        #[arg(long)]
        description: Option<String>,
    },
    Remove {
        id: String,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    /// Scan a source and add the toolbox described by its `toolbox.yml`.
    Import {
        source: String,
        /// Alias of the discovered toolbox descriptor.
        alias: String,
        /// Output path (default: <alias>.pyt).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ToolCommand {
    Add {
        toolbox: String,
        source: String,
        /// Tool directory relative to the source root.
        path: String,
        #[arg(long)]
        alias: Option<String>,
        #[arg(long)]
        disabled: bool,
    },
    Remove {
        toolbox: String,
        source: String,
        path: String,
    },
    Update {
        toolbox: String,
        source: String,
        path: String,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
        #[arg(long, conflicts_with = "clear_alias")]
        alias: Option<String>,
        #[arg(long)]
        clear_alias: bool,
    },
    List {
        toolbox: String,
        #[arg(long)]
        enabled_only: bool,
    },
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
    let settings = Settings::with_overrides(cli.workspace, cli.catalog);
    let service = CatalogService::new(&settings.catalog_path, &settings.workspace);

    match cli.command {
        Command::Init { overwrite } => {
            service
                .create_new(None, overwrite)
                .with_context(|| format!("initializing {}", settings.catalog_path.display()))?;
            println!("Created catalog {}", service.catalog_path().display());
        }
        Command::Source(command) => run_source(&service, command)?,
        Command::Toolbox(command) => run_toolbox(&service, command)?,
        Command::Tool(command) => run_tool(&service, command)?,
        Command::Scan { sources } => run_scan(&service, sources.as_deref())?,
        Command::Check => {
            let mut issues = service.workspace().layout_issues();
            issues.extend(service.validate().context("validating catalog")?);
            if issues.is_empty() {
                println!("OK");
            } else {
                for issue in &issues {
                    println!("warning: {issue}");
                }
            }
        }
        Command::Validate { toolbox } => {
            let (valid, errors) = GeneratorService::new(&service)
                .validate_toolbox(&toolbox)
                .with_context(|| format!("validating toolbox {toolbox}"))?;
            if !valid {
                for error in &errors {
                    eprintln!("  {error}");
                }
                bail!("toolbox '{toolbox}' has {} invalid tool(s)", errors.len());
            }
            println!("Toolbox '{toolbox}' is valid");
        }
        Command::Generate {
            toolbox,
            output,
            no_metadata,
        } => {
            let generator = GeneratorService::new(&service);
            let output = match output {
                Some(path) => path,
                None => {
                    let entry = service
                        .get_toolbox(&toolbox)?
                        .with_context(|| format!("Toolbox '{toolbox}' not found"))?;
                    generator.default_output_path(&entry)
                }
            };
            let generated = generator
                .generate_toolbox(&toolbox, &output, !no_metadata)
                .with_context(|| format!("generating toolbox {toolbox}"))?;
            println!("Generated {}", generated.pyt_path.display());
            if let Some(metadata) = generated.metadata_path {
                println!("Generated {}", metadata.display());
            }
        }
        Command::GenerateAll {
            output_dir,
            no_metadata,
        } => {
            let dir = output_dir.unwrap_or_else(|| service.workspace().toolboxes_dir());
            let generated = GeneratorService::new(&service)
                .generate_all_toolboxes(&dir, !no_metadata)
                .context("generating toolboxes")?;
            for toolbox in &generated {
                println!("Generated {}", toolbox.pyt_path.display());
            }
            println!("{} toolbox(es) generated", generated.len());
        }
    }
    Ok(())
}

fn run_source(service: &CatalogService, command: SourceCommand) -> Result<()> {
    match command {
        SourceCommand::Add {
            id,
            name,
            kind,
            location,
            disabled,
        } => {
            let kind = SourceType::try_from(kind.as_str())?;
            let mut new = NewSource::new(&id, name, kind).enabled(!disabled);
            new.path = location.path;
            new.url = location.url;
            new.local_path = location.local_path;
            if let Some(branch) = location.branch {
                new.branch = Some(branch);
            }
            let source = service
                .add_source(new)
                .with_context(|| format!("adding source {id}"))?;
            println!("Added {} source '{}'", source.kind.as_str(), source.id);
        }
        SourceCommand::Remove { id, force } => {
            service
                .remove_source(&id, force)
                .with_context(|| format!("removing source {id}"))?;
            println!("Removed source '{id}'");
        }
        SourceCommand::Update {
            id,
            name,
            location,
            enable,
            disable,
        } => {
            let update = SourceUpdate {
                name,
                url: location.url.map(Some),
                branch: location.branch.map(Some),
                path: location.path.map(Some),
                local_path: location.local_path.map(Some),
                enabled: toggle(enable, disable),
                ..SourceUpdate::default()
            };
            service
                .update_source(&id, update)
                .with_context(|| format!("updating source {id}"))?;
            println!("Updated source '{id}'");
        }
        SourceCommand::List { enabled_only } => {
            for source in service.list_sources(enabled_only)? {
                let location = match source.location() {
                    Ok(SourceLocation::Directory(path)) => path.display().to_string(),
                    Ok(SourceLocation::Git { url, branch, .. }) => format!("{url}@{branch}"),
                    Err(err) => format!("<{err}>"),
                };
                let state = if source.enabled { "enabled" } else { "disabled" };
                println!(
                    "{}\t{}\t{}\t{} tool(s)\t{}",
                    source.id,
                    source.kind.as_str(),
                    state,
                    source.discovered_tools,
                    location
                );
                if let Some(error) = &source.last_error {
                    println!("  last error: {error}");
                }
            }
        }
    }
    Ok(())
}

fn run_toolbox(service: &CatalogService, command: ToolboxCommand) -> Result<()> {
    match command {
        ToolboxCommand::Add {
            id,
            name,
            path,
            description,
        } => {
            service
                .add_toolbox(&id, &name, path, description)
                .with_context(|| format!("adding toolbox {id}"))?;
            println!("Added toolbox '{id}'");
        }
        ToolboxCommand::Remove { id } => {
            service
                .remove_toolbox(&id)
                .with_context(|| format!("removing toolbox {id}"))?;
            println!("Removed toolbox '{id}'");
        }
        ToolboxCommand::Update {
            id,
            name,
            path,
            description,
        } => {
            let update = ToolboxUpdate {
                name,
                path,
                description: description.map(Some),
                ..ToolboxUpdate::default()
            };
            service
                .update_toolbox(&id, update)
                .with_context(|| format!("updating toolbox {id}"))?;
            println!("Updated toolbox '{id}'");
        }
        ToolboxCommand::List => {
            for toolbox in service.list_toolboxes()? {
                let enabled = toolbox.enabled_tools().count();
                println!(
                    "{}\t{}\t{}\t{}/{} tool(s) enabled",
                    toolbox.id,
                    toolbox.name,
                    toolbox.path.display(),
                    enabled,
                    toolbox.tools.len()
                );
            }
        }
        ToolboxCommand::Import {
            source,
            alias,
            output,
        } => {
            let discovery = DiscoveryService::new(service);
            let outcome = discovery
                .scan_source(&source)
                .with_context(|| format!("scanning source {source}"))?;
            let discovered = outcome
                .toolboxes
                .iter()
                .find(|toolbox| toolbox.id.eq_ignore_ascii_case(&alias))
                .with_context(|| {
                    format!("no toolbox descriptor with alias '{alias}' in source '{source}'")
                })?;
            let output = output.unwrap_or_else(|| {
                PathBuf::from(format!("{}.pyt", alias.to_ascii_lowercase()))
            });
            let toolbox = discovery
                .import_toolbox(discovered, output)
                .with_context(|| format!("importing toolbox {alias}"))?;
            println!(
                "Imported toolbox '{}' with {} tool(s)",
                toolbox.id,
                toolbox.tools.len()
            );
        }
    }
    Ok(())
}

fn run_tool(service: &CatalogService, command: ToolCommand) -> Result<()> {
    match command {
        ToolCommand::Add {
            toolbox,
            source,
            path,
            alias,
            disabled,
        } => {
            let reference = service
                .add_tool_to_toolbox(&toolbox, &source, &path, !disabled, alias)
                .with_context(|| format!("adding {source}:{path} to {toolbox}"))?;
            println!(
                "Added {}:{} to toolbox '{toolbox}'",
                reference.source_id, reference.tool_path
            );
        }
        ToolCommand::Remove {
            toolbox,
            source,
            path,
        } => {
            service
                .remove_tool_from_toolbox(&toolbox, &source, &path)
                .with_context(|| format!("removing {source}:{path} from {toolbox}"))?;
            println!("Removed {source}:{path} from toolbox '{toolbox}'");
        }
        ToolCommand::Update {
            toolbox,
            source,
            path,
            enable,
            disable,
            alias,
            clear_alias,
        } => {
            let alias = match (alias, clear_alias) {
                (Some(alias), _) => Some(Some(alias)),
                (None, true) => Some(None),
                (None, false) => None,
            };
            let update = ToolReferenceUpdate {
                enabled: toggle(enable, disable),
                alias,
            };
            service
                .update_tool_in_toolbox(&toolbox, &source, &path, update)
                .with_context(|| format!("updating {source}:{path} in {toolbox}"))?;
            println!("Updated {source}:{path} in toolbox '{toolbox}'");
        }
        ToolCommand::List {
            toolbox,
            enabled_only,
        } => {
            for reference in service.list_tools_in_toolbox(&toolbox, enabled_only)? {
                let mut line = format!("{}:{}", reference.source_id, reference.tool_path);
                if let Some(alias) = &reference.alias {
                    line.push_str(&format!(" as {alias}"));
                }
                if !reference.enabled {
                    line.push_str(" (disabled)");
                }
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn run_scan(service: &CatalogService, sources: Option<&str>) -> Result<()> {
    let discovery = DiscoveryService::new(service);
    let requested = sources.map(split_list).unwrap_or_default();
    if requested.is_empty() {
        let results = discovery.scan_all_sources().context("scanning sources")?;
        for (id, outcome) in &results {
            print_outcome(id, outcome);
        }
        return Ok(());
    }
    for id in &requested {
        let outcome = discovery
            .scan_source(id)
            .with_context(|| format!("scanning source {id}"))?;
        print_outcome(id, &outcome);
    }
    Ok(())
}

fn print_outcome(source_id: &str, outcome: &ScanOutcome) {
    println!(
        "{source_id}: {} tool(s), {} toolbox(es)",
        outcome.tools.len(),
        outcome.toolboxes.len()
    );
    for tool in &outcome.tools {
        println!("  tool {} ({})", tool.id, tool.tool_path);
    }
    for toolbox in &outcome.toolboxes {
        println!("  toolbox {} ({})", toolbox.id, toolbox.toolbox_path);
    }
    for warning in &outcome.warnings {
        println!("  skipped {}: {}", warning.path.display(), warning.message);
    }
}

fn toggle(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}
