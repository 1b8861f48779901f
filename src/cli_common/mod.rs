//! Общий модуль для CLI
//!
//! Инициализация логирования, цветной вывод и разбор аргументов мутаций.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use crate::mutation::{ArgumentValue, MutationArgumentContainer, MutationParameter};

/// Инициализирует систему логирования. `RUST_LOG` переопределяет уровень по умолчанию.
pub fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "ok".green().bold(), message.green());
}

pub fn print_warning(message: &str) {
    println!("{} {}", "warning".yellow().bold(), message.yellow());
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "error".red().bold(), message.red());
}

/// Проверяет существование файла
pub fn validate_path(path: &Path, description: &str) -> Result<()> {
    if !path.exists() {
        return Err(anyhow::anyhow!("{} does not exist: {}", description, path.display()));
    }
    Ok(())
}

/// Split `name=value` as given to `--arg`.
pub fn split_argument(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .filter(|(name, _)| !name.trim().is_empty())
        .map(|(name, value)| (name.trim(), value))
        .ok_or_else(|| anyhow::anyhow!("argument '{}' is not of the form name=value", raw))
}

/// Build the argument container for a definition, typing each `name=value` by its declared parameter.
pub fn parse_arguments(raw: &[String], parameters: &[MutationParameter]) -> Result<MutationArgumentContainer> {
    let mut container = MutationArgumentContainer::new();
    for item in raw {
        let (name, text) = split_argument(item)?;
        let parameter = parameters
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| anyhow::anyhow!("mutation has no parameter '{}'", name))?;
        let value = ArgumentValue::parse(parameter.kind, name, text)
            .with_context(|| format!("invalid value for parameter '{}'", name))?;
        container.insert(name, value);
    }
    Ok(container)
}
