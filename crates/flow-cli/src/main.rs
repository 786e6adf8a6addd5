//! Flow CLI - load, settle and convert flow documents

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use flow_engine::{DocumentFormat, FlowError, PortRef, Settings, SettingsError, ToolManager, ToolRegistry};

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Run and convert flow documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available tools by group
    List,

    /// Load a document, settle it and report the result
    Run {
        /// Path to a serialized document
        file: PathBuf,

        /// Also list outputs that are neither watched nor connected
        #[arg(long)]
        dangling: bool,
    },

    /// Re-encode a document in another format
    Convert {
        /// Path to a serialized document
        file: PathBuf,

        /// Target format (compact, friendly, base64)
        #[arg(short, long, default_value = "friendly", value_parser = parse_format)]
        format: DocumentFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show or change front-end settings
    Settings {
        /// Settings directory
        #[arg(long, default_value = ".flow")]
        dir: PathBuf,

        /// Setting key, e.g. autoWatch
        key: Option<String>,

        /// New value for the key
        value: Option<bool>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    #[error("{0} tool(s) reported errors")]
    ToolErrors(usize),
}

fn parse_format(s: &str) -> Result<DocumentFormat, FlowError> {
    s.parse()
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let registry = flow_tools::registry();

    let result = match cli.command {
        Commands::List => {
            print!("{}", list_tools(&registry));
            Ok(())
        }
        Commands::Run { file, dangling } => run_document(&file, dangling, &registry).await,
        Commands::Convert {
            file,
            format,
            output,
        } => convert_document(&file, format, output.as_deref(), &registry).await,
        Commands::Settings { dir, key, value } => settings(&dir, key, value).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn read(path: &Path) -> Result<String, CliError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn list_tools(registry: &ToolRegistry) -> String {
    let mut out = String::new();
    for group in registry.groups() {
        let _ = writeln!(out, "{}", group.name);
        for def in group.tools {
            let _ = writeln!(out, "  {:<16} {}", def.name, def.description);
        }
    }
    out
}

/// Load a document into a fresh manager and wait for it to settle
async fn load(file: &Path, registry: &ToolRegistry) -> Result<ToolManager, CliError> {
    let data = read(file).await?;
    let manager = ToolManager::new();
    manager.deserialize(&data, registry)?;
    manager.settled().await;
    Ok(manager)
}

fn report(manager: &ToolManager, dangling: bool) -> (String, usize) {
    let mut out = String::new();

    let _ = writeln!(out, "Tools:");
    manager.read(|graph| {
        for tool in graph.tools() {
            let _ = writeln!(out, "  {} ({}): {}", tool.name(), tool.type_name(), tool.state());
        }
    });

    let watches = manager.iter_watches(dangling);
    if !watches.is_empty() {
        let _ = writeln!(out, "Watches:");
        for watch in watches {
            let side = match watch.port {
                PortRef::Input(_) => "in",
                PortRef::Output(_) => "out",
            };
            let _ = writeln!(
                out,
                "  {}.{} [{}] = {}",
                watch.tool_name, watch.port_name, side, watch.value
            );
        }
    }

    let errors = manager.iter_errors();
    if !errors.is_empty() {
        let _ = writeln!(out, "Errors:");
        for error in &errors {
            match &error.input {
                Some(input) => {
                    let _ = writeln!(out, "  {}.{}: {}", error.tool, input, error.message);
                }
                None => {
                    let _ = writeln!(out, "  {}: {}", error.tool, error.message);
                }
            }
        }
    }

    (out, errors.len())
}

async fn run_document(file: &Path, dangling: bool, registry: &ToolRegistry) -> Result<(), CliError> {
    let manager = load(file, registry).await?;
    let (out, errors) = report(&manager, dangling);
    print!("{}", out);
    if errors > 0 {
        return Err(CliError::ToolErrors(errors));
    }
    Ok(())
}

async fn convert_document(
    file: &Path,
    format: DocumentFormat,
    output: Option<&Path>,
    registry: &ToolRegistry,
) -> Result<(), CliError> {
    let data = read(file).await?;
    let manager = ToolManager::new();
    manager.deserialize(&data, registry)?;
    let encoded = manager.serialize(format)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, encoded)
                .await
                .map_err(|source| CliError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            log::info!("Wrote {} document to {:?}", format, path);
        }
        None => println!("{}", encoded),
    }
    Ok(())
}

async fn settings(dir: &Path, key: Option<String>, value: Option<bool>) -> Result<(), CliError> {
    let mut settings = Settings::load(dir).await?;

    match (key, value) {
        (None, _) => {
            for key in Settings::KEYS {
                println!("{} = {}", key, settings.get(key).unwrap_or_default());
            }
        }
        (Some(key), None) => {
            let value = settings
                .get(&key)
                .ok_or_else(|| CliError::UnknownSetting(key.clone()))?;
            println!("{} = {}", key, value);
        }
        (Some(key), Some(value)) => {
            settings.set(&key, value)?;
            settings.save(dir).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_engine::{InputRef, OutputRef, Value};

    fn sample() -> String {
        let registry = flow_tools::registry();
        let manager = ToolManager::new();
        let calc = manager.add_tool(registry.get("Calc").unwrap(), None);
        let split = manager.add_tool(registry.get("Split").unwrap(), None);
        manager
            .set_input_val(&InputRef::new(calc, "expr"), Value::from("$a * 2"))
            .unwrap();
        manager
            .set_input_val(&InputRef::new(calc, "a"), Value::Number(21.0))
            .unwrap();
        manager
            .connect(&InputRef::new(split, "in"), &OutputRef::new(calc, "out"))
            .unwrap();
        manager
            .set_watch(&PortRef::Output(OutputRef::new(calc, "out")), true)
            .unwrap();
        manager.serialize(DocumentFormat::Friendly).unwrap()
    }

    #[test]
    fn test_list_groups_tools() {
        let listing = list_tools(&flow_tools::registry());
        assert!(listing.starts_with("Test\n"));
        assert!(listing.contains("  Calc "));
        assert!(listing.contains("Crypto\n  Caesar shift"));
    }

    #[tokio::test]
    async fn test_run_reports_states_and_watches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        tokio::fs::write(&path, sample()).await.unwrap();

        let manager = load(&path, &flow_tools::registry()).await.unwrap();
        let (out, errors) = report(&manager, false);

        // Loading schedules exactly one full pass
        assert_eq!(manager.read(|g| g.generation()), 1);

        assert_eq!(errors, 0);
        assert!(out.contains("  Calc (Calc): good"));
        assert!(out.contains("  Split (Split): good"));
        assert!(out.contains("  Calc.out [out] = 42"));
    }

    #[tokio::test]
    async fn test_convert_round_trips_through_base64() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("graph.json");
        let target = dir.path().join("graph.b64");
        tokio::fs::write(&source, sample()).await.unwrap();
        let registry = flow_tools::registry();

        convert_document(&source, DocumentFormat::Base64, Some(&target), &registry)
            .await
            .unwrap();

        let encoded = tokio::fs::read_to_string(&target).await.unwrap();
        let manager = ToolManager::new();
        manager.deserialize(&encoded, &registry).unwrap();
        assert!(manager.find("Calc").is_some());
        assert!(manager.find("Split").is_some());
    }

    #[tokio::test]
    async fn test_missing_file_names_path() {
        let err = load(Path::new("/nonexistent/graph.json"), &flow_tools::registry())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("/nonexistent/graph.json"));
    }

    #[tokio::test]
    async fn test_settings_persist() {
        let dir = tempfile::tempdir().unwrap();
        settings(dir.path(), Some("autoWatch".to_string()), Some(true))
            .await
            .unwrap();
        let loaded = Settings::load(dir.path()).await.unwrap();
        assert!(loaded.auto_watch);

        let err = settings(dir.path(), Some("nope".to_string()), None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CliError::UnknownSetting(_)));
    }
}
