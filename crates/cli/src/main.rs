//! CLI for interacting with a gavel auction server.
//!
//! This binary provides commands for:
//! - Creating auctions of every kind
//! - Bidding, committing, and revealing sealed bids
//! - Claiming, withdrawing, and cancelling
//! - Querying auctions, prices, and vault balances
//!
//! The `commit` command draws a fresh 32-byte salt, prints it, and submits
//! the commitment; keep the salt, it is needed to reveal.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::{json, Value};
use tracing::info;

use gavel_types::{commitment_digest, CommitmentScheme};

#[derive(Parser)]
#[command(name = "gavel")]
#[command(about = "CLI for gavel auctions")]
struct Cli {
    /// Server RPC endpoint
    #[arg(long, default_value = "http://127.0.0.1:9944")]
    rpc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint fungible units into a principal's vault balance
    Fund {
        #[arg(long)]
        principal: String,
        #[arg(long)]
        asset: String,
        #[arg(long)]
        amount: String,
    },

    /// Mint a unique token owned by a principal
    MintItem {
        #[arg(long)]
        asset: String,
        #[arg(long)]
        token_id: String,
        #[arg(long)]
        owner: String,
    },

    /// Set the server's simulated timestamp
    SetTimestamp {
        #[arg(long)]
        timestamp: u64,
    },

    /// Advance the server's simulated timestamp
    AdvanceTime {
        #[arg(long)]
        seconds: u64,
    },

    /// Create an English or all-pay auction
    CreateAscending {
        #[arg(long)]
        sender: String,
        /// "english" or "all_pay"
        #[arg(long, default_value = "english")]
        kind: String,
        #[arg(long)]
        name: String,
        /// "unique" or "fungible"
        #[arg(long, default_value = "unique")]
        asset_kind: String,
        #[arg(long)]
        asset_id: String,
        #[arg(long)]
        id_or_amount: String,
        #[arg(long)]
        pay_asset: String,
        #[arg(long)]
        starting_bid: String,
        #[arg(long)]
        min_bid_delta: String,
        #[arg(long)]
        duration: u64,
        #[arg(long, default_value = "0")]
        deadline_extension: u64,
    },

    /// Create a sealed-bid (Vickrey) auction
    CreateVickrey {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "unique")]
        asset_kind: String,
        #[arg(long)]
        asset_id: String,
        #[arg(long)]
        id_or_amount: String,
        #[arg(long)]
        pay_asset: String,
        #[arg(long)]
        min_bid: String,
        #[arg(long)]
        commit_duration: u64,
        #[arg(long)]
        reveal_duration: u64,
        #[arg(long, default_value = "0")]
        commit_fee: String,
    },

    /// Create a reverse-Dutch auction (linear, or exponential with a decay factor)
    CreateDutch {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "unique")]
        asset_kind: String,
        #[arg(long)]
        asset_id: String,
        #[arg(long)]
        id_or_amount: String,
        #[arg(long)]
        pay_asset: String,
        #[arg(long)]
        start_price: String,
        #[arg(long)]
        min_price: String,
        #[arg(long)]
        duration: u64,
        /// Decay factor in 1e5 fixed units; selects the exponential curve
        #[arg(long)]
        decay_factor: Option<u64>,
    },

    /// Place a bid (amount omitted for reverse-Dutch)
    Bid {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        auction_id: u64,
        #[arg(long)]
        amount: Option<String>,
    },

    /// Commit a sealed bid: draws a salt, prints it, submits the commitment
    Commit {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        auction_id: u64,
        /// Bid amount to seal (kept local until reveal)
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "0")]
        fee: String,
        /// "keccak256" or "sha256"; must match the server
        #[arg(long, default_value = "keccak256")]
        scheme: String,
    },

    /// Reveal a sealed bid
    Reveal {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        auction_id: u64,
        #[arg(long)]
        amount: String,
        /// Hex salt printed by the commit command
        #[arg(long)]
        salt: String,
    },

    /// Claim the item as winner
    Claim {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        auction_id: u64,
    },

    /// Withdraw proceeds as auctioneer
    Withdraw {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        auction_id: u64,
    },

    /// Cancel the session as auctioneer
    Cancel {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        auction_id: u64,
    },

    /// Get auction details
    GetAuction {
        #[arg(long)]
        auction_id: u64,
    },

    /// List all auctions
    ListAuctions,

    /// Current ask of a reverse-Dutch auction
    Price {
        #[arg(long)]
        auction_id: u64,
    },

    /// A principal's fungible vault balance
    Balance {
        #[arg(long)]
        asset: String,
        #[arg(long)]
        principal: String,
    },

    /// A bidder's escrowed tally for an auction
    Tally {
        #[arg(long)]
        auction_id: u64,
        #[arg(long)]
        principal: String,
    },
}

fn parse_scheme(s: &str) -> Result<CommitmentScheme> {
    match s {
        "keccak256" => Ok(CommitmentScheme::Keccak256),
        "sha256" => Ok(CommitmentScheme::Sha256),
        other => Err(anyhow!("unknown commitment scheme: {other}")),
    }
}

async fn call_events(client: &HttpClient, method: &str, params: Value) -> Result<()> {
    let events: Vec<Value> = client.request(method, vec![params]).await?;
    for event in &events {
        println!("{}", serde_json::to_string_pretty(event)?);
    }
    Ok(())
}

async fn commit_cmd(
    client: &HttpClient,
    sender: &str,
    auction_id: u64,
    amount: &str,
    fee: &str,
    scheme: &str,
) -> Result<()> {
    let scheme = parse_scheme(scheme)?;
    let amount_units: u128 = amount.parse()?;

    let mut salt = [0u8; 32];
    OsRng.fill_bytes(&mut salt);
    let commitment = commitment_digest(scheme, amount_units, &salt);

    let params = json!({
        "sender": sender,
        "auction_id": auction_id,
        "commitment": hex::encode(commitment),
        "fee_amount": fee,
    });
    let _events: Vec<Value> = client.request("auction_commitBid", vec![params]).await?;

    info!("commitment submitted for auction {}", auction_id);
    println!("Commitment submitted");
    println!("  Auction ID: {}", auction_id);
    println!("  Amount:     {} (kept local)", amount);
    println!("  Salt:       {}", hex::encode(salt));
    println!("Keep the salt; it is required to reveal.");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gavel_cli=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let client = HttpClientBuilder::default().build(&cli.rpc)?;

    match cli.command {
        Commands::Fund {
            principal,
            asset,
            amount,
        } => {
            let _: bool = client
                .request("admin_fund", (principal, asset, amount))
                .await?;
            println!("Funded");
        }

        Commands::MintItem {
            asset,
            token_id,
            owner,
        } => {
            let _: bool = client
                .request("admin_mintItem", (asset, token_id, owner))
                .await?;
            println!("Item minted");
        }

        Commands::SetTimestamp { timestamp } => {
            let _: bool = client.request("admin_setTimestamp", vec![timestamp]).await?;
            println!("Timestamp set to {}", timestamp);
        }

        Commands::AdvanceTime { seconds } => {
            let now: u64 = client.request("admin_advanceTime", vec![seconds]).await?;
            println!("Timestamp now {}", now);
        }

        Commands::CreateAscending {
            sender,
            kind,
            name,
            asset_kind,
            asset_id,
            id_or_amount,
            pay_asset,
            starting_bid,
            min_bid_delta,
            duration,
            deadline_extension,
        } => {
            let params = json!({
                "sender": sender,
                "kind": kind,
                "name": name,
                "asset_kind": asset_kind,
                "asset_id": asset_id,
                "id_or_amount": id_or_amount,
                "pay_asset": pay_asset,
                "starting_bid": starting_bid,
                "min_bid_delta": min_bid_delta,
                "duration": duration,
                "deadline_extension": deadline_extension,
            });
            let id: u64 = client.request("auction_create", vec![params]).await?;
            println!("Auction ID: {}", id);
        }

        Commands::CreateVickrey {
            sender,
            name,
            asset_kind,
            asset_id,
            id_or_amount,
            pay_asset,
            min_bid,
            commit_duration,
            reveal_duration,
            commit_fee,
        } => {
            let params = json!({
                "sender": sender,
                "kind": "vickrey",
                "name": name,
                "asset_kind": asset_kind,
                "asset_id": asset_id,
                "id_or_amount": id_or_amount,
                "pay_asset": pay_asset,
                "min_bid": min_bid,
                "commit_duration": commit_duration,
                "reveal_duration": reveal_duration,
                "commit_fee": commit_fee,
            });
            let id: u64 = client.request("auction_create", vec![params]).await?;
            println!("Auction ID: {}", id);
        }

        Commands::CreateDutch {
            sender,
            name,
            asset_kind,
            asset_id,
            id_or_amount,
            pay_asset,
            start_price,
            min_price,
            duration,
            decay_factor,
        } => {
            let kind = if decay_factor.is_some() {
                "exp_rdutch"
            } else {
                "linear_rdutch"
            };
            let params = json!({
                "sender": sender,
                "kind": kind,
                "name": name,
                "asset_kind": asset_kind,
                "asset_id": asset_id,
                "id_or_amount": id_or_amount,
                "pay_asset": pay_asset,
                "start_price": start_price,
                "min_price": min_price,
                "duration": duration,
                "decay_factor": decay_factor,
            });
            let id: u64 = client.request("auction_create", vec![params]).await?;
            println!("Auction ID: {}", id);
        }

        Commands::Bid {
            sender,
            auction_id,
            amount,
        } => {
            let params = json!({
                "sender": sender,
                "auction_id": auction_id,
                "amount": amount,
            });
            call_events(&client, "auction_bid", params).await?;
        }

        Commands::Commit {
            sender,
            auction_id,
            amount,
            fee,
            scheme,
        } => {
            commit_cmd(&client, &sender, auction_id, &amount, &fee, &scheme).await?;
        }

        Commands::Reveal {
            sender,
            auction_id,
            amount,
            salt,
        } => {
            let params = json!({
                "sender": sender,
                "auction_id": auction_id,
                "amount": amount,
                "salt": salt,
            });
            call_events(&client, "auction_revealBid", params).await?;
        }

        Commands::Claim { sender, auction_id } => {
            let params = json!({ "sender": sender, "auction_id": auction_id });
            call_events(&client, "auction_claim", params).await?;
        }

        Commands::Withdraw { sender, auction_id } => {
            let params = json!({ "sender": sender, "auction_id": auction_id });
            call_events(&client, "auction_withdraw", params).await?;
        }

        Commands::Cancel { sender, auction_id } => {
            let params = json!({ "sender": sender, "auction_id": auction_id });
            call_events(&client, "auction_cancel", params).await?;
        }

        Commands::GetAuction { auction_id } => {
            let record: Option<Value> = client
                .request("query_getAuction", vec![auction_id])
                .await?;
            match record {
                Some(r) => println!("{}", serde_json::to_string_pretty(&r)?),
                None => println!("Auction {} not found", auction_id),
            }
        }

        Commands::ListAuctions => {
            let records: Vec<Value> =
                client.request("query_listAuctions", Vec::<()>::new()).await?;
            if records.is_empty() {
                println!("No auctions found");
            } else {
                for r in &records {
                    println!(
                        "  [{}] {} - {} ({})",
                        r["auction_id"], r["kind"], r["status"], r["name"]
                    );
                }
            }
        }

        Commands::Price { auction_id } => {
            let price: String = client.request("query_getPrice", vec![auction_id]).await?;
            println!("Current ask: {}", price);
        }

        Commands::Balance { asset, principal } => {
            let balance: String = client
                .request("query_getBalance", (asset, principal))
                .await?;
            println!("Balance: {}", balance);
        }

        Commands::Tally {
            auction_id,
            principal,
        } => {
            let tally: String = client
                .request("query_getBidTally", (auction_id, principal))
                .await?;
            println!("Tally: {}", tally);
        }
    }

    Ok(())
}
