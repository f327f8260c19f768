use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use readaloud::app::{Overrides, init_config, paragraphs_json, read_input, run_read};
use readaloud::cli::{Cli, Commands, ConfigAction};
use readaloud::config::Config;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    let overrides = Overrides {
        service: cli.service,
        voice: cli.voice.clone(),
        speed: cli.speed,
        timeout: cli.timeout,
    };

    match cli.command.take() {
        None => read(None, &cli, overrides).await?,
        Some(Commands::Read { file }) => read(file, &cli, overrides).await?,
        Some(Commands::Paragraphs { file }) => {
            let text = read_input(file.as_deref())?;
            println!("{}", paragraphs_json(&text)?);
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref(), overrides, cli.quiet)?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "readaloud", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Read a document aloud. The controller blocks, so it runs on a blocking
/// thread while remote requests use this runtime.
async fn read(file: Option<PathBuf>, cli: &Cli, overrides: Overrides) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    overrides.apply(&mut config);

    let interactive = file.is_some() && std::io::stdin().is_terminal();
    let text = read_input(file.as_deref())?;
    let quiet = cli.quiet;
    let verbosity = cli.verbose;

    if verbosity >= 2 {
        eprintln!("readaloud {}", readaloud::version_string());
        eprintln!("{}", config.redacted().to_toml()?.dimmed());
    }

    #[cfg(feature = "remote")]
    let runtime = tokio::runtime::Handle::current();
    tokio::task::spawn_blocking(move || {
        #[cfg(feature = "remote")]
        let result = run_read(config, &text, runtime, interactive, quiet, verbosity);
        #[cfg(not(feature = "remote"))]
        let result = run_read(config, &text, interactive, quiet, verbosity);
        result
    })
    .await??;
    Ok(())
}

fn config_path(custom_path: Option<&Path>) -> Result<PathBuf> {
    match custom_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Config::default_path()?),
    }
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        // An explicit path must exist
        Config::load(path)?
    } else {
        // Try default path, fall back to defaults
        Config::load_or_default(&Config::default_path()?)?
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&Path>,
    overrides: Overrides,
    quiet: bool,
) -> Result<()> {
    let path = config_path(custom_path)?;
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => {
            let mut config = load_config(custom_path)?;
            overrides.apply(&mut config);
            print!("{}", config.redacted().to_toml()?);
            if let Err(e) = config.validate() {
                eprintln!("{} {}", "warning:".yellow(), e);
            }
        }
        ConfigAction::Init { force } => {
            init_config(&path, force)?;
            if !quiet {
                eprintln!("{} {}", "Wrote".green(), path.display());
            }
        }
    }
    Ok(())
}
