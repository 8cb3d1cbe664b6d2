#![forbid(unsafe_code)]
//! Offline wallet tool: generate keys, derive addresses and sign transfers

use clap::{Parser, Subcommand};
use colored::*;
use ledgerchain::amount::Amount;
use ledgerchain::crypto::{Address, KeyPair, Wallet};
use ledgerchain::transaction::Transaction;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generates a new wallet and prints it as JSON
    New,
    /// Prints the address belonging to a private key
    Address {
        /// Hex-encoded secp256k1 private key
        private_key: String,
    },
    /// Builds and signs a transfer, printing the transaction as JSON for
    /// `POST /api/transaction/signed`
    Sign {
        /// Hex-encoded private key of the sender
        #[arg(long)]
        private_key: String,
        /// Recipient address
        #[arg(long)]
        to: String,
        /// Amount in coins, up to 8 decimals
        #[arg(long)]
        value: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::New => new_wallet()?,
        Commands::Address { private_key } => {
            let keypair = KeyPair::from_secret_hex(private_key)?;
            println!("{}", keypair.address().to_hex().bright_green());
        }
        Commands::Sign {
            private_key,
            to,
            value,
        } => sign(private_key, to, value)?,
    }

    Ok(())
}

fn new_wallet() -> Result<(), Box<dyn std::error::Error>> {
    let wallet = Wallet::generate()?;

    eprintln!("{}", "New wallet created".bright_cyan());
    eprintln!("  Address: {}", wallet.address.to_hex().bright_green());
    eprintln!(
        "{}",
        "Keep the private key secret; anyone holding it can spend the balance.".yellow()
    );
    println!("{}", serde_json::to_string_pretty(&wallet)?);

    Ok(())
}

fn sign(private_key: &str, to: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let keypair = KeyPair::from_secret_hex(private_key)?;
    let recipient = Address::from_hex(to)?;
    let value: Amount = value.parse()?;

    let tx = Transaction::create(&keypair, keypair.address(), recipient, value)?;

    eprintln!(
        "{} {} -> {}",
        "Signed".bright_green(),
        value.to_string().bright_yellow(),
        recipient.to_hex().bright_white()
    );
    eprintln!("  Hash: {}", tx.hash_str());
    eprintln!(
        "{}",
        "Submit it with: POST /api/transaction/signed".bright_black()
    );
    println!("{}", serde_json::to_string_pretty(&tx)?);

    Ok(())
}
