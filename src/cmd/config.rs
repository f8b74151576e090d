//! Configuration view and validation commands: `tandem config`.

use anyhow::{Context, Result};

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use tandem::config::TANDEM_DIR;
    use tandem::tandem_config::TandemToml;

    let tandem_dir = project_dir.join(TANDEM_DIR);
    let config_path = tandem_dir.join("tandem.toml");

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Tandem Configuration");
            println!("====================");
            println!();

            let settings = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                TandemToml::load(&config_path)?
            } else {
                println!("No tandem.toml found at {}", config_path.display());
                println!("Using default configuration.");
                TandemToml::default()
            };
            println!();

            let rendered =
                toml::to_string_pretty(&settings).context("Failed to render configuration")?;
            println!("{}", rendered.trim_end());
            println!();

            println!("Agents:");
            let registry = settings.registry();
            for key in registry.keys() {
                if let Some(agent) = registry.get(key) {
                    let fallback = agent
                        .fallback
                        .as_deref()
                        .map(|f| format!(" (fallback: {f})"))
                        .unwrap_or_default();
                    println!("  {} = {}{}", key, agent.command.join(" "), fallback);
                }
            }
            println!();

            if !config_path.exists() {
                println!("Run 'tandem config init' to create a tandem.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No tandem.toml found. Using defaults (valid).");
                return Ok(());
            }

            let settings = TandemToml::load(&config_path)?;
            let warnings = settings.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("tandem.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            std::fs::create_dir_all(&tandem_dir)
                .with_context(|| format!("Failed to create {}", tandem_dir.display()))?;

            TandemToml::default().save(&config_path)?;

            println!("Created tandem.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [roles] planner, reviewer");
            println!("  - [defaults] retries, cycle budgets, preflight and fallback");
            println!("  - [tests] command, timeout_secs");
            println!("  - [agents.<key>] to replace or add agent CLIs");
            println!();
        }
    }

    Ok(())
}
