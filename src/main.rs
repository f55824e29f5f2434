use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use teller::reader::{Command, OperationReader};
use teller::writer::StatementWriter;
use teller::{Bank, CoreConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Seconds a user's worker may sit idle before shutting down
    #[arg(long)]
    stale_handler_timeout: Option<u64>,

    /// Seconds between reaper sweeps for dead workers
    #[arg(long)]
    stale_check_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = CoreConfig::from_env();
    if let Some(secs) = cli.stale_handler_timeout {
        config.stale_handler_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.stale_check_interval {
        config.stale_check_interval = Duration::from_secs(secs);
    }

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    let bank = Bank::new(config);

    for command in reader.commands() {
        let command = match command {
            Ok(command) => command,
            Err(e) => {
                error!(error = %e, "skipping malformed operation");
                continue;
            }
        };
        if let Err(e) = run_command(&bank, command).await {
            warn!(error = %e, "operation failed");
        }
    }

    let stdout = io::stdout();
    let mut writer = StatementWriter::new(stdout.lock());
    writer.write_statement(bank.statement().await)?;

    Ok(())
}

async fn run_command(bank: &Bank, command: Command) -> teller::Result<()> {
    match command {
        Command::Create { user } => bank.create_user(user),
        Command::Deposit {
            user,
            amount,
            currency,
        } => bank.deposit(&user, amount, currency).await.map(|_| ()),
        Command::Withdraw {
            user,
            amount,
            currency,
        } => bank.withdraw(&user, amount, currency).await.map(|_| ()),
        Command::Balance { user, currency } => {
            let balance = bank.balance(&user, currency.clone()).await?;
            info!(user = %user, currency = %currency, balance = %balance, "balance");
            Ok(())
        }
        Command::Send {
            from,
            to,
            amount,
            currency,
        } => bank.send(&from, &to, amount, currency).await.map(|_| ()),
    }
}
