//! inistore CLI - edit sectioned key/value files from scripts.

use clap::Parser;
use inistore::cli::{Cli, Commands, SectionCommands};
use inistore::commands::{self, Output, VariableSource};
use inistore::config::resolve_config;
use inistore::{ConfigStore, PathLockRegistry};
use std::io::{self, BufRead};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `debug`, `inistore=trace`).
const LOG_ENV: &str = "INISTORE_LOG";

fn main() {
    init_logging();

    let cli = Cli::parse();
    let human = cli.human_readable;

    if let Err(e) = run(cli) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Log to stderr so stdout stays parseable.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), inistore::Error> {
    let resolved = resolve_config(cli.config.as_deref())?;
    tracing::debug!(source = %resolved.source, "loaded store config");

    let store = ConfigStore::new(Arc::new(PathLockRegistry::new())).with_config(resolved.config);
    let human = cli.human_readable;

    match cli.command {
        Commands::Get { file, section, key } => {
            output(&commands::get(&store, &file, &section, &key)?, human)
        }
        Commands::Set {
            file,
            section,
            key,
            value,
        } => output(&commands::set(&store, &file, &section, &key, &value)?, human),
        Commands::RenameKey {
            file,
            section,
            key,
            new_key,
        } => output(
            &commands::rename_key(&store, &file, &section, &key, &new_key)?,
            human,
        ),
        Commands::DeleteKey { file, section, key } => {
            output(&commands::delete_key(&store, &file, &section, &key)?, human)
        }
        Commands::Section { command } => match command {
            SectionCommands::List { file } => {
                output(&commands::section_list(&store, &file)?, human)
            }
            SectionCommands::Show { file, section } => {
                output(&commands::section_show(&store, &file, &section)?, human)
            }
            SectionCommands::Raw {
                file,
                section,
                blank,
            } => output(
                &commands::section_raw(&store, &file, &section, blank)?,
                human,
            ),
            SectionCommands::Add { file, sections } => {
                output(&commands::section_add(&store, &file, &sections)?, human)
            }
            SectionCommands::Delete { file, sections } => {
                output(&commands::section_delete(&store, &file, &sections)?, human)
            }
            SectionCommands::Rename { file, from, to } => {
                output(&commands::section_rename(&store, &file, &from, &to)?, human)
            }
            SectionCommands::Replace {
                file,
                section,
                lines,
                stdin,
            } => {
                let input: Option<Box<dyn BufRead>> = if stdin {
                    Some(Box::new(io::stdin().lock()))
                } else {
                    None
                };
                output(
                    &commands::section_replace(&store, &file, &section, &lines, input)?,
                    human,
                )
            }
        },
        Commands::RawLine {
            file,
            section,
            line,
            prepend,
        } => output(
            &commands::raw_line(&store, &file, &section, &line, prepend)?,
            human,
        ),
        Commands::Compact { file } => output(&commands::compact(&store, &file)?, human),
        Commands::Merge { dest, sources } => {
            output(&commands::merge(&store, &dest, &sources)?, human)
        }
        Commands::Expand {
            text,
            file,
            section,
            scope,
            set,
        } => {
            let source = VariableSource {
                file: file.as_deref(),
                section: &section,
                scope,
                assignments: &set,
            };
            output(&commands::expand(&store, &text, source)?, human)
        }
    }

    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
