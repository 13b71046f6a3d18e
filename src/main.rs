use academy_sync::academy::types::SmsFilter;
use academy_sync::academy::{AcademyClient, ApiError, Resource};
use academy_sync::{config, logging};

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "academy-sync")]
#[command(about = "Cached command-line client for the academy dashboard backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/academy-sync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print every record of a resource
  List {
    /// users, batches, content, attendance, yoyoTest, analytics, fees, sms, works or investments
    #[arg(value_parser = parse_resource)]
    resource: Resource,
    /// Skip the cache and refresh from the backend
    #[arg(short, long)]
    force: bool,
  },
  /// Print the analytics overview
  Analytics {
    #[arg(short, long)]
    force: bool,
  },
  /// Print SMS transactions, optionally filtered
  Sms {
    #[arg(long)]
    limit: Option<u32>,
    /// credit or debit
    #[arg(long = "type")]
    transaction_type: Option<String>,
    /// Start date, YYYY-MM-DD
    #[arg(long)]
    from: Option<String>,
    /// End date, YYYY-MM-DD
    #[arg(long)]
    to: Option<String>,
    #[arg(short, long)]
    force: bool,
  },
  /// Clear the local cache so every resource is refetched on next read
  Sync,
  /// Print when a resource was last fetched from the backend
  LastSync {
    #[arg(value_parser = parse_resource)]
    resource: Resource,
  },
}

fn parse_resource(name: &str) -> Result<Resource, String> {
  Resource::from_name(name).ok_or_else(|| {
    let known: Vec<&str> = Resource::ALL.iter().map(|r| r.name()).collect();
    format!("unknown resource '{}', expected one of: {}", name, known.join(", "))
  })
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log)?;

  let client = AcademyClient::new(&config)?;
  if let Err(e) = client.cache().initialize().await {
    warn!("Continuing without local cache: {}", e);
  }

  let result = run(&client, args.command).await;
  client.cache().dispose().await;
  result.map_err(report)
}

/// Log backend failures in full and show the operator the backend's own message.
fn report(err: color_eyre::Report) -> color_eyre::Report {
  match err.downcast_ref::<ApiError>() {
    Some(api) => {
      error!(error = %api, "Request failed");
      eyre!("{}", api.user_message())
    }
    None => err,
  }
}

async fn run(client: &AcademyClient, command: Command) -> Result<()> {
  match command {
    Command::List { resource, force } => list(client, resource, force).await,
    Command::Analytics { force } => print_json(&client.analytics(force).await?),
    Command::Sms {
      limit,
      transaction_type,
      from,
      to,
      force,
    } => {
      let filter = SmsFilter {
        limit,
        transaction_type,
        from,
        to,
      };
      print_json(&client.sms_transactions(&filter, force).await?)
    }
    Command::Sync => {
      client.sync_all().await;
      info!("Local cache cleared");
      Ok(())
    }
    Command::LastSync { resource } => {
      match client.last_sync_time(resource).await {
        Some(at) => println!("{}", at.to_rfc3339()),
        None => println!("never"),
      }
      Ok(())
    }
  }
}

async fn list(client: &AcademyClient, resource: Resource, force: bool) -> Result<()> {
  match resource {
    Resource::Users => print_json(&client.users.list(force).await?),
    Resource::Batches => print_json(&client.batches.list(force).await?),
    Resource::Content => print_json(&client.content.list(force).await?),
    Resource::Attendance => print_json(&client.attendance.list(force).await?),
    Resource::FitnessTests => print_json(&client.fitness_tests.list(force).await?),
    Resource::Analytics => print_json(&client.analytics(force).await?),
    Resource::Fees => print_json(&client.fees.list(force).await?),
    Resource::SmsTransactions => print_json(&client.sms.list(force).await?),
    Resource::Works => print_json(&client.works.list(force).await?),
    Resource::Investments => print_json(&client.investments.list(force).await?),
  }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let json =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to format output: {}", e))?;
  println!("{}", json);
  Ok(())
}
