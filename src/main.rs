use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::Path;
use voxlink::app::{CaptureOptions, SpeakOptions, run_capture_node, run_speaker_node};
use voxlink::cli::{Cli, Commands, ConfigAction};
use voxlink::config::{Config, RelayMode};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        if std::io::stderr().is_terminal() {
            eprintln!("{} {}", "error:".red().bold(), e);
        } else {
            eprintln!("error: {}", e);
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        command,
        config: config_path,
        quiet,
        port,
        endpoint,
    } = cli;
    let config_path = config_path.as_deref();
    let port = port.as_deref();
    let endpoint = endpoint.as_deref();

    match command {
        Commands::Capture {
            file,
            once,
            mode,
            interval,
            device,
        } => {
            let mut config = load_config(config_path, port, endpoint)?;
            if let Some(mode) = mode {
                config.remote.mode = parse_mode(&mode)?;
            }
            if let Some(interval) = interval {
                config.remote.poll_interval_ms = interval;
            }
            let opts = CaptureOptions { file, once, device };
            run_capture_node(config, opts, quiet).await?;
        }
        Commands::Speak { save, device } => {
            let config = load_config(config_path, port, endpoint)?;
            let opts = SpeakOptions { save, device };
            run_speaker_node(config, opts, quiet)?;
        }
        Commands::Devices => {
            list_audio_devices()?;
        }
        Commands::Ports => {
            for port in voxlink::link::serial::available_ports()? {
                println!("{}", port);
            }
        }
        Commands::Config { action } => {
            handle_config_command(action, config_path, port, endpoint)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "voxlink",
                &mut std::io::stdout(),
            );
        }
    }
    Ok(())
}

/// Load configuration, apply environment and CLI overrides.
fn load_config(
    config_path: Option<&Path>,
    port: Option<&str>,
    endpoint: Option<&str>,
) -> Result<Config> {
    let mut config = Config::load_or_default(config_path)?.with_env_overrides();

    if let Some(port) = port {
        config.link.port = Some(port.to_string());
    }
    if let Some(endpoint) = endpoint {
        config.remote.endpoint = endpoint.to_string();
    }

    config.validate()?;
    Ok(config)
}

fn parse_mode(s: &str) -> Result<RelayMode> {
    match s {
        "push" => Ok(RelayMode::Push),
        "poll" => Ok(RelayMode::Poll),
        other => anyhow::bail!("unknown mode '{}' (expected push or poll)", other),
    }
}

fn list_audio_devices() -> Result<()> {
    println!("Input devices:");
    for name in voxlink::audio::capture::list_devices()? {
        println!("  {}", name);
    }
    Ok(())
}

fn handle_config_command(
    action: ConfigAction,
    config_path: Option<&Path>,
    port: Option<&str>,
    endpoint: Option<&str>,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, port, endpoint)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", Config::default_path().display());
        }
        ConfigAction::Init => {
            let path = Config::default_path();
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, toml::to_string_pretty(&Config::default())?)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
