//! SuMsy CLI - Main entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sumsy_cli::{commands, AppContext};
use sumsy_core::Mani;

#[derive(Parser)]
#[command(name = "sumsy")]
#[command(about = "SuMsy - mutual credit with demurrage and basic income", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Account directory for batch jubilee (JSON)
    #[arg(long)]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the system ledger
    Init,

    /// Show the system parameters
    Parameters,

    /// Generate a new client key file
    Keygen {
        /// Output file path
        output: PathBuf,
    },

    /// Register the ledger of a key file
    Register {
        #[arg(long)]
        key: PathBuf,
        #[arg(long)]
        alias: Option<String>,
    },

    /// Pay another ledger (stays pending until confirmed)
    Transfer {
        #[arg(long)]
        key: PathBuf,
        /// Destination ledger id
        destination: String,
        /// Amount, e.g. 12,50
        amount: Mani,
    },

    /// Confirm the pending entry of a ledger
    Confirm {
        #[arg(long)]
        key: PathBuf,
    },

    /// Cancel the pending transfer of a ledger
    Cancel {
        #[arg(long)]
        key: PathBuf,
    },

    /// Show the current entry of a ledger
    Current { ledger: String },

    /// Show the pending entry of a ledger
    Pending { ledger: String },

    /// Show recent history of a ledger
    History { ledger: String },

    /// Show the registered public key of a ledger
    FindKey { ledger: String },

    /// Apply demurrage and income to one ledger or the whole directory
    Jubilee {
        #[arg(long)]
        ledger: Option<String>,
    },

    /// Audit a ledger (verify hash chain)
    Audit {
        ledger: String,
        /// Also verify entry signatures
        #[arg(long)]
        verify_signatures: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Keygen needs no store
    if let Commands::Keygen { output } = &cli.command {
        return commands::keygen(output);
    }

    let ctx = AppContext::new(&cli.data, cli.config.as_deref(), cli.directory.as_deref())?;

    match cli.command {
        Commands::Init => commands::init(&ctx).await?,
        Commands::Parameters => commands::parameters(&ctx).await?,
        Commands::Keygen { .. } => {}
        Commands::Register { key, alias } => commands::register(&ctx, &key, alias.as_deref()).await?,
        Commands::Transfer {
            key,
            destination,
            amount,
        } => commands::transfer(&ctx, &key, &destination, amount).await?,
        Commands::Confirm { key } => commands::confirm(&ctx, &key).await?,
        Commands::Cancel { key } => commands::cancel(&ctx, &key).await?,
        Commands::Current { ledger } => commands::current(&ctx, &ledger).await?,
        Commands::Pending { ledger } => commands::pending(&ctx, &ledger).await?,
        Commands::History { ledger } => commands::history(&ctx, &ledger).await?,
        Commands::FindKey { ledger } => commands::find_key(&ctx, &ledger).await?,
        Commands::Jubilee { ledger } => commands::jubilee(&ctx, ledger.as_deref()).await?,
        Commands::Audit {
            ledger,
            verify_signatures,
        } => commands::audit(&ctx, &ledger, verify_signatures).await?,
    }

    Ok(())
}
