use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use armortags::catalog::{self, CatalogFilter, JsonCatalog};
use armortags::construct::{OccupationRoster, Workspace};
use armortags::interface::CatalogLoader;
use armortags::omod;
use armortags::settings::{self, DataRootPrompt, NoPrompt, Settings};
use armortags::taxonomy::{Layer, Taxonomy};
use armortags::Result;

#[derive(Parser)]
#[command(name = "armortags")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Curates armor tag tables and the clothing taxonomy")]
struct Cli {
    /// Settings file, armortags.toml when not given
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// The game's Data directory, overrides the settings
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Never ask for the data directory
    #[arg(long)]
    unattended: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or edit clothing types
    Taxonomy {
        #[command(subcommand)]
        action: TaxonomyAction,
    },
    /// Show how every armor of a catalog dump is classified
    Classify {
        /// JSON catalog dump from the game-data tooling
        #[arg(short, long, value_name = "FILE")]
        catalog: PathBuf,
        /// Tag table with explicit clothing types
        #[arg(short, long, value_name = "FILE")]
        table: Option<PathBuf>,
        /// Only editor ids containing this text
        #[arg(long, default_value = "")]
        editor: String,
        /// Only modules containing this text
        #[arg(long, default_value = "")]
        module: String,
    },
    /// Change tags of some armors and save the table
    Tag {
        #[arg(short, long, value_name = "FILE")]
        catalog: PathBuf,
        /// Tag table to update, created when missing
        #[arg(short, long, value_name = "FILE")]
        table: PathBuf,
        /// Editor ids to change
        #[arg(short, long = "armor", required = true)]
        armors: Vec<String>,
        /// FIELD=true|false, for example male=true or "Raider=false"
        #[arg(long = "set", value_name = "FIELD=BOOL")]
        flags: Vec<String>,
        #[arg(long)]
        min_level: Option<u32>,
        #[arg(long)]
        clothing_type: Option<String>,
    },
    /// Rewrite a tag table, converting legacy form ids to editor ids
    Migrate {
        #[arg(short, long, value_name = "FILE")]
        catalog: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        table: PathBuf,
        /// Where to write, in place when not given
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Dump the add-ons of a catalog
    Omods {
        #[arg(short, long, value_name = "FILE")]
        catalog: PathBuf,
        #[arg(short, long, default_value = "omods.csv", value_name = "FILE")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum TaxonomyAction {
    /// List every clothing type
    List,
    /// Add a clothing type
    Add {
        name: String,
        /// Taxonomy file, relative to the taxonomy directory
        #[arg(long)]
        file: Option<String>,
        /// Body slots covered by the armor itself
        #[arg(long, value_delimiter = ';')]
        primary: Vec<u8>,
        /// Body slots covered by the armor addon
        #[arg(long, value_delimiter = ';')]
        secondary: Vec<u8>,
    },
    /// Remove a clothing type
    Remove { name: String },
}

struct StdinPrompt;

impl DataRootPrompt for StdinPrompt {
    fn ask(&mut self) -> Option<PathBuf> {
        print!("Game Data directory: ");
        io::stdout().flush().ok()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let line = line.trim();
        if line.is_empty() { None } else { Some(PathBuf::from(line)) }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if cli.data_dir.is_some() {
        settings.data_dir = cli.data_dir.clone();
    }
    match run(&cli, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "armortags failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, settings: &Settings) -> Result<()> {
    let data_root = if cli.unattended {
        settings::locate_data_root(settings, &mut NoPrompt)?
    } else {
        settings::locate_data_root(settings, &mut StdinPrompt)?
    };
    let taxonomy_root = settings.taxonomy_root(&data_root);
    match &cli.command {
        Commands::Taxonomy { action } => {
            let mut taxonomy = Taxonomy::load(&taxonomy_root, settings.default_taxonomy_file.as_str());
            run_taxonomy(&mut taxonomy, action)
        }
        Commands::Classify { catalog, table, editor, module } => {
            let workspace = open_workspace(settings, &taxonomy_root, catalog)?;
            if let Some(table) = table {
                workspace.load_tags(&resolve_table(settings, &data_root, table))?;
            }
            let catalog = workspace.catalog.lock()?;
            let filter = CatalogFilter {
                editor: editor.clone(),
                module: module.clone(),
                ..CatalogFilter::default()
            };
            for position in catalog.filtered(&filter) {
                let Some(record) = catalog.get(position) else { continue };
                let description = workspace.description(record.key())?.unwrap_or_default();
                println!("{}\t{}\t{}", record.label(), record.module(), description);
            }
            Ok(())
        }
        Commands::Tag { catalog, table, armors, flags, min_level, clothing_type } => {
            let workspace = open_workspace(settings, &taxonomy_root, catalog)?;
            let table = resolve_table(settings, &data_root, table);
            if table.is_file() {
                workspace.load_tags(&table)?;
            }
            let ids: Vec<&str> = armors.iter().map(String::as_str).collect();
            let selected = workspace.select_editor_ids(&ids)?;
            info!(selected, "armors selected");
            let mut view = workspace.aggregate()?;
            for flag in flags {
                let (field, value) = parse_flag(flag)?;
                view = workspace.apply_boolean(field, value)?;
            }
            if let Some(level) = min_level {
                view = workspace.apply_min_level(*level)?;
            }
            if let Some(name) = clothing_type {
                view = workspace.apply_clothing_type(name)?;
            }
            println!("{view:#?}");
            let written = workspace.save_tags(&table)?;
            println!("{written} rows written to {}", table.display());
            Ok(())
        }
        Commands::Migrate { catalog, table, output } => {
            let workspace = open_workspace(settings, &taxonomy_root, catalog)?;
            let table = resolve_table(settings, &data_root, table);
            let read = workspace.load_tags(&table)?;
            let output = output.clone().unwrap_or_else(|| table.clone());
            let written = workspace.save_tags(&output)?;
            println!("{read} rows read, {written} rows written to {}", output.display());
            Ok(())
        }
        Commands::Omods { catalog, output } => {
            let catalog = catalog::scan(&JsonCatalog::new(catalog))?;
            omod::write_omod_dump(output, catalog.omods())?;
            println!("{} add-ons written to {}", catalog.omods().len(), output.display());
            Ok(())
        }
    }
}

fn run_taxonomy(taxonomy: &mut Taxonomy, action: &TaxonomyAction) -> Result<()> {
    match action {
        TaxonomyAction::List => {
            for clothing_type in taxonomy.iter() {
                println!(
                    "{}\t{}\t{}\t{}",
                    clothing_type.name(),
                    clothing_type.source_file(),
                    clothing_type.primary(),
                    clothing_type.secondary()
                );
            }
            Ok(())
        }
        TaxonomyAction::Add { name, file, primary, secondary } => {
            if let Some(file) = file {
                taxonomy.set_last_used_file(file);
            }
            let stored = taxonomy.add(name).name().to_string();
            for index in primary {
                taxonomy.set_slot(&stored, Layer::Primary, *index, true)?;
            }
            for index in secondary {
                taxonomy.set_slot(&stored, Layer::Secondary, *index, true)?;
            }
            taxonomy.save()?;
            println!("added {stored}");
            Ok(())
        }
        TaxonomyAction::Remove { name } => {
            match taxonomy.remove(name) {
                Some(removed) => {
                    taxonomy.save()?;
                    println!("removed {}", removed.name());
                }
                None => println!("no clothing type named {name}"),
            }
            Ok(())
        }
    }
}

fn open_workspace(settings: &Settings, taxonomy_root: &Path, catalog: &Path) -> Result<Workspace> {
    let taxonomy = Taxonomy::load(taxonomy_root, settings.default_taxonomy_file.as_str());
    let workspace = Workspace::new(taxonomy, OccupationRoster::default());
    let handle = CatalogLoader::start(Box::new(JsonCatalog::new(catalog)));
    let scanned = handle.join()?;
    workspace.install_catalog(scanned)?;
    Ok(workspace)
}

// bare file names are looked up in the clothing directory
fn resolve_table(settings: &Settings, data_root: &Path, table: &Path) -> PathBuf {
    if table.components().count() == 1 && !table.exists() {
        settings.clothing_root(data_root).join(table)
    } else {
        table.to_path_buf()
    }
}

fn parse_flag(flag: &str) -> Result<(&str, bool)> {
    let parse_error = || armortags::TagError::Parse {
        message: format!("expected FIELD=true or FIELD=false, got '{flag}'"),
        line: None,
    };
    let (field, value) = flag.split_once('=').ok_or_else(parse_error)?;
    let value = match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => return Err(parse_error()),
    };
    Ok((field.trim(), value))
}
