
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;
use std::time::Duration;

use super::{Config, ConfigError, EmbeddingConfig, SearchConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("Superconductor Search Configuration").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Embedding Server").bold().yellow());
    eprintln!("Configure the Ollama-compatible server that serves the embedding model.");
    eprintln!();

    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Search Defaults").bold().yellow());
    configure_search(&mut config.search)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_embedding_connection(&config.embedding) {
        eprintln!("{}", style("✓ Embedding server reachable").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to the embedding server").yellow()
        );
        eprintln!("You can continue, but start the server before building the index.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!(
        "  Dimension: {}",
        style(config.embedding.embedding_dimension).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    match config.embedding_url() {
        Ok(url) => eprintln!("  Server URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Server URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Search:").bold().yellow());
    eprintln!(
        "  Results: {} (allowed {}-{})",
        style(config.search.default_results).cyan(),
        config.search.min_results,
        config.search.max_results
    );
    eprintln!(
        "  Over-fetch factor: {}",
        style(config.search.overfetch_factor).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Query generation:").bold().yellow());
    eprintln!("  Model: {}", style(&config.llm.model).cyan());
    eprintln!(
        "  ANTHROPIC_API_KEY: {}",
        credential_status("ANTHROPIC_API_KEY")
    );
    eprintln!("  YOUTUBE_API_KEY: {}", credential_status("YOUTUBE_API_KEY"));

    eprintln!();
    eprintln!(
        "Web UI: {}",
        style(format!(
            "http://{}:{}",
            config.server.bind_address, config.server.port
        ))
        .cyan()
    );
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn credential_status(variable: &str) -> console::StyledObject<&'static str> {
    if std::env::var(variable).is_ok_and(|value| !value.trim().is_empty()) {
        style("set").green()
    } else {
        style("not set").red()
    }
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No valid configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == embedding.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Server protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Server host")
        .default(embedding.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = EmbeddingConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..EmbeddingConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Server port")
        .default(embedding.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model (use the fine-tuned model name once trained)")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedding.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for document encoding")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    embedding.set_protocol(protocol)?;
    embedding.set_host(host)?;
    embedding.set_port(port)?;
    embedding.set_model(model)?;
    embedding.set_embedding_dimension(dimension)?;
    embedding.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_search(search: &mut SearchConfig) -> Result<()> {
    let min_results = search.min_results;
    let max_results = search.max_results;

    let default_results: usize = Input::new()
        .with_prompt("Default number of results")
        .default(search.default_results)
        .validate_with(|input: &usize| -> Result<(), String> {
            if (min_results..=max_results).contains(input) {
                Ok(())
            } else {
                Err(format!(
                    "Must be between {} and {}",
                    min_results, max_results
                ))
            }
        })
        .interact_text()?;

    let overfetch_factor: usize = Input::new()
        .with_prompt("Candidate over-fetch factor")
        .default(search.overfetch_factor)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=50).contains(input) {
                Ok(())
            } else {
                Err("Over-fetch factor must be between 1 and 50")
            }
        })
        .interact_text()?;

    search.default_results = default_results;
    search.overfetch_factor = overfetch_factor;
    search.validate()?;

    Ok(())
}

fn test_embedding_connection(embedding: &EmbeddingConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        embedding.protocol, embedding.host, embedding.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => (400..500).contains(&code),
        Err(_) => false,
    }
}
