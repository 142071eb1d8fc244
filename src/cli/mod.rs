//! Command-line interface.
//!
//! Without a subcommand the binary runs the server. Subcommands talk to a
//! running server through `client::ApiClient`:
//! - `login` / `logout` - manage the saved session token
//! - `trips` - list your trips
//! - `invites` - list pending invites
//! - `accept <id>` / `decline <id>` - resolve an invite

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::{ApiClient, FileTokenStore, TokenStore};

#[derive(Parser, Debug)]
#[command(name = "tripmate")]
#[command(author, version, about = "Collaborative trip planning server", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "tripmate.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API URL for client subcommands
    #[arg(long, env = "TRIPMATE_API_URL", default_value = "http://localhost:4000")]
    pub api_url: String,

    /// File holding the session token for client subcommands
    #[arg(long, env = "TRIPMATE_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and save the session token
    Login {
        email: String,
        /// Password (prompted from TRIPMATE_PASSWORD if omitted)
        #[arg(long, env = "TRIPMATE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the saved session token
    Logout,
    /// List trips you organize or belong to
    Trips,
    /// List pending invites addressed to you
    Invites,
    /// Accept an invite
    Accept { invite_id: String },
    /// Decline an invite
    Decline { invite_id: String },
}

fn client(cli: &Cli) -> Result<ApiClient> {
    let store: Arc<dyn TokenStore> = match &cli.token_file {
        Some(path) => Arc::new(FileTokenStore::new(path)),
        None => Arc::new(FileTokenStore::default_location()),
    };
    ApiClient::new(&cli.api_url, store).context("Failed to create HTTP client")
}

/// Run a client subcommand
pub async fn run_command(cli: &Cli) -> Result<()> {
    let Some(command) = &cli.command else {
        // No subcommand means start the server, handled in main.rs
        return Ok(());
    };
    let client = client(cli)?;

    match command {
        Commands::Login { email, password } => {
            let user = client
                .login(email, password)
                .await
                .context("Login failed")?;
            println!("Logged in as {} <{}>", user.name, user.email);
        }
        Commands::Logout => {
            client.logout()?;
            println!("Logged out");
        }
        Commands::Trips => cmd_trips(&client).await?,
        Commands::Invites => cmd_invites(&client).await?,
        Commands::Accept { invite_id } => {
            let response = client.accept_invite(invite_id).await?;
            println!(
                "Joined {} ({})",
                response.trip.name, response.trip.destination
            );
        }
        Commands::Decline { invite_id } => {
            let response = client.decline_invite(invite_id).await?;
            println!("{}", response.message);
        }
    }
    Ok(())
}

async fn cmd_trips(client: &ApiClient) -> Result<()> {
    let trips = client.my_trips().await?.trips;
    if trips.is_empty() {
        println!("No trips found.");
        return Ok(());
    }

    println!();
    println!(
        "{:<36}  {:<24}  {:<20}  {:<23}  {:<7}",
        "ID", "NAME", "DESTINATION", "DATES", "MEMBERS"
    );
    println!("{}", "-".repeat(118));
    for trip in trips {
        println!(
            "{:<36}  {:<24}  {:<20}  {} - {}  {:<7}",
            trip.id,
            truncate(&trip.name, 24),
            truncate(&trip.destination, 20),
            trip.start_date,
            trip.end_date,
            trip.members.len()
        );
    }
    println!();
    Ok(())
}

async fn cmd_invites(client: &ApiClient) -> Result<()> {
    let invites = client.my_invites().await?.invites;
    if invites.is_empty() {
        println!("No pending invites.");
        return Ok(());
    }

    println!();
    println!(
        "{:<36}  {:<24}  {:<20}  {:<20}",
        "INVITE", "TRIP", "DESTINATION", "FROM"
    );
    println!("{}", "-".repeat(106));
    for invite in invites {
        println!(
            "{:<36}  {:<24}  {:<20}  {:<20}",
            invite.id,
            truncate(&invite.trip_name, 24),
            truncate(&invite.destination, 20),
            truncate(&invite.invited_by_name, 20)
        );
    }
    println!();
    Ok(())
}

/// Truncate a string to a maximum number of characters
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
