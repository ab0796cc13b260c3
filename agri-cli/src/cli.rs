use agri_core::{Config, DetectionKind, HttpBackend, Session, chat::WELCOME_MESSAGE};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{CustomType, InquireError, Text};
use std::path::PathBuf;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "agri", version, about = "Krishi Mitra agricultural assistant")]
pub struct Cli {
    /// Backend origin, e.g. "http://localhost:8000". Overrides the configured one.
    #[arg(long, global = true, env = "AGRI_BASE_URL")]
    pub base_url: Option<String>,

    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect a plant disease from a leaf image.
    Disease {
        image: PathBuf,

        /// Ask the chatbot for a treatment when a problem is found.
        #[arg(long)]
        solution: bool,
    },

    /// Identify a pest from an image.
    Pest {
        image: PathBuf,

        /// Ask the chatbot how to control the pest.
        #[arg(long)]
        solution: bool,
    },

    /// Talk to the chatbot. Without a message, starts an interactive session.
    Chat { message: Vec<String> },

    /// Forget the chatbot's conversation memory.
    ClearMemory,

    /// Set the location used for weather and advice.
    SetLocation { location: Option<String> },

    /// Show weather for a location, or for the saved one.
    Weather { location: Option<String> },

    /// Get growing advice for a crop, e.g. `agri advice wheat`.
    Advice {
        #[arg(required = true)]
        crop: Vec<String>,
    },

    /// Interactively configure the backend origin and upload limit.
    Configure,

    /// Print where the configuration file lives.
    ConfigPath,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_path = Config::config_file_path()?;
        let config = Config::load_from(&config_path)?;

        match self.command {
            Command::Configure => return configure(config, &config_path),
            Command::ConfigPath => {
                println!("{}", config_path.display());
                return Ok(());
            }
            _ => {}
        }

        // The flag only applies to this run and is never written back.
        let mut effective = config.clone();
        if let Some(url) = &self.base_url {
            effective.set_base_url(url)?;
        }

        tracing::debug!(base_url = effective.base_url(), config = %config_path.display(), "starting");
        let backend = HttpBackend::from_config(&effective)
            .with_context(|| format!("Invalid backend URL: {}", effective.base_url()))?;
        let mut session = Session::new(Box::new(backend), config).with_persistence(config_path);

        match self.command {
            Command::Disease { image, solution } => {
                predict(&mut session, DetectionKind::Disease, image, solution).await?
            }
            Command::Pest { image, solution } => {
                predict(&mut session, DetectionKind::Pest, image, solution).await?
            }
            Command::Chat { message } => {
                let message = message.join(" ");
                if message.trim().is_empty() {
                    chat_loop(&mut session).await?;
                } else if let Some(reply) = session.send_chat(&message).await {
                    println!("{}", render::reply(&reply));
                }
            }
            Command::ClearMemory => {
                session.clear_memory().await;
                println!("Chat history cleared.");
            }
            Command::SetLocation { location } => {
                let location = match location {
                    Some(l) => l,
                    None => Text::new("Location:")
                        .with_help_message("City or district, e.g. Pune")
                        .prompt()
                        .context("Failed to read location")?,
                };
                let confirmation = session.set_location(&location).await?;
                println!("{confirmation}");
            }
            Command::Weather { location } => {
                let view = session.weather(location.as_deref()).await;
                println!("{}", render::weather(&view));
            }
            Command::Advice { crop } => {
                let reply = session
                    .advice(&crop.join(" "))
                    .await
                    .context("Failed to fetch crop advice")?;
                println!("{}", render::reply(&reply));
            }
            Command::Configure | Command::ConfigPath => unreachable!("handled above"),
        }

        Ok(())
    }
}

async fn predict(
    session: &mut Session,
    kind: DetectionKind,
    image: PathBuf,
    solution: bool,
) -> Result<()> {
    let view = session.predict_path(kind, Some(image.as_path())).await?;
    println!("{}", render::prediction(kind, &view));

    if !solution {
        return Ok(());
    }

    match view.diagnosis() {
        Some(d) if d.needs_solution() => {
            println!();
            let reply = session.solution(kind).await?;
            println!("{}", render::reply(&reply));
        }
        Some(_) => println!("No problem detected, no treatment needed."),
        None => {}
    }

    Ok(())
}

async fn chat_loop(session: &mut Session) -> Result<()> {
    if let Some(view) = session.startup_weather().await {
        println!("{}\n", render::weather(&view));
    }
    println!("{WELCOME_MESSAGE}");
    println!("Type /clear to start over, /quit to leave.\n");

    loop {
        let input = match Text::new("You:").prompt() {
            Ok(input) => input,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e).context("Failed to read chat input"),
        };

        match input.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear_memory().await;
                println!("{WELCOME_MESSAGE}\n");
            }
            _ => {
                if let Some(reply) = session.send_chat(&input).await {
                    println!("{}\n", render::reply(&reply));
                }
            }
        }
    }

    Ok(())
}

fn configure(mut config: Config, path: &std::path::Path) -> Result<()> {
    let base_url = Text::new("Backend URL:")
        .with_default(config.base_url())
        .prompt()
        .context("Failed to read backend URL")?;
    config.set_base_url(&base_url)?;

    let max_mb = CustomType::<f64>::new("Maximum image size (MB):")
        .with_default(config.max_upload_bytes() as f64 / (1024.0 * 1024.0))
        .with_error_message("Please type a number, e.g. 5")
        .prompt()
        .context("Failed to read upload limit")?;
    if max_mb > 0.0 {
        config.max_upload_bytes = Some((max_mb * 1024.0 * 1024.0) as u64);
    }

    let timeout = CustomType::<u64>::new("Request timeout in seconds (0 = none):")
        .with_default(config.timeout_secs.unwrap_or(0))
        .prompt()
        .context("Failed to read timeout")?;
    config.timeout_secs = (timeout > 0).then_some(timeout);

    config.save_to(path)?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}
