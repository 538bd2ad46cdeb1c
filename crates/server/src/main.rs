//! JSON-RPC dev harness for the gavel auction engine.
//!
//! Hosts the engine in memory with a simulated clock, an in-memory vault for
//! custody, and static protocol parameters. Time is admin-settable so
//! deadline-dependent paths can be exercised without waiting.

use anyhow::Result;
use clap::Parser;
use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::Server;
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use gavel_engine::{
    dispatch, dutch, AuctionCall, CallContext, CreateAuction, CreateParams, LedgerState,
    ProtocolParams,
};
use gavel_types::{AssetId, AssetKind, AuctionKind, CommitmentScheme, Principal};

mod types;
mod vault;

use types::*;
use vault::Vault;

/// Server configuration.
#[derive(Parser, Debug)]
#[command(name = "gavel-server")]
#[command(about = "In-memory JSON-RPC harness for the gavel auction engine")]
struct Config {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:9944")]
    listen: SocketAddr,

    /// Protocol fee in basis points
    #[arg(long, default_value = "100")]
    fee_bps: u16,

    /// Treasury principal (hex)
    #[arg(long, default_value = "00000000000000000000000000000000000000000000000000000000000000fe")]
    treasury: String,

    /// Commitment digest: "keccak256" or "sha256"
    #[arg(long, default_value = "keccak256")]
    commitment_scheme: String,
}

/// Shared harness state.
struct ChainState {
    ledger: LedgerState,
    vault: Vault,
    params: ProtocolParams,
    /// Simulated clock, admin-settable.
    timestamp: u64,
}

/// RPC API of the harness.
#[rpc(server)]
pub trait GavelApi {
    // ============ Admin Methods ============

    /// Set the simulated timestamp (for testing time-dependent logic).
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned>;

    /// Advance the simulated timestamp; returns the new value.
    #[method(name = "admin_advanceTime")]
    async fn admin_advance_time(&self, seconds: u64) -> Result<u64, ErrorObjectOwned>;

    /// Mint fungible units into a principal's vault balance.
    #[method(name = "admin_fund")]
    async fn admin_fund(
        &self,
        principal: String,
        asset: String,
        amount: String,
    ) -> Result<bool, ErrorObjectOwned>;

    /// Mint a unique token owned by a principal.
    #[method(name = "admin_mintItem")]
    async fn admin_mint_item(
        &self,
        asset: String,
        token_id: String,
        owner: String,
    ) -> Result<bool, ErrorObjectOwned>;

    // ============ Auction Methods ============

    /// Create a new auction; returns its id.
    #[method(name = "auction_create")]
    async fn auction_create(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned>;

    /// Place a bid.
    #[method(name = "auction_bid")]
    async fn auction_bid(&self, params: BidParams) -> Result<Vec<EventRpc>, ErrorObjectOwned>;

    /// Submit a sealed-bid commitment.
    #[method(name = "auction_commitBid")]
    async fn auction_commit_bid(
        &self,
        params: CommitBidParams,
    ) -> Result<Vec<EventRpc>, ErrorObjectOwned>;

    /// Open a sealed bid.
    #[method(name = "auction_revealBid")]
    async fn auction_reveal_bid(
        &self,
        params: RevealBidParams,
    ) -> Result<Vec<EventRpc>, ErrorObjectOwned>;

    /// Claim the item through the winner-settlement path.
    #[method(name = "auction_claim")]
    async fn auction_claim(&self, params: SessionCall) -> Result<Vec<EventRpc>, ErrorObjectOwned>;

    /// Pay out proceeds and the fee cut.
    #[method(name = "auction_withdraw")]
    async fn auction_withdraw(
        &self,
        params: SessionCall,
    ) -> Result<Vec<EventRpc>, ErrorObjectOwned>;

    /// Cancel the session and return the item.
    #[method(name = "auction_cancel")]
    async fn auction_cancel(&self, params: SessionCall)
        -> Result<Vec<EventRpc>, ErrorObjectOwned>;

    // ============ Query Methods ============

    /// Current simulated timestamp.
    #[method(name = "chain_getTimestamp")]
    async fn chain_get_timestamp(&self) -> Result<u64, ErrorObjectOwned>;

    /// Get auction by id.
    #[method(name = "query_getAuction")]
    async fn query_get_auction(
        &self,
        auction_id: u64,
    ) -> Result<Option<AuctionRecordRpc>, ErrorObjectOwned>;

    /// List all auctions.
    #[method(name = "query_listAuctions")]
    async fn query_list_auctions(&self) -> Result<Vec<AuctionRecordRpc>, ErrorObjectOwned>;

    /// Current ask of a reverse-Dutch auction at the simulated clock.
    #[method(name = "query_getPrice")]
    async fn query_get_price(&self, auction_id: u64) -> Result<String, ErrorObjectOwned>;

    /// A bidder's escrowed tally for an auction.
    #[method(name = "query_getBidTally")]
    async fn query_get_bid_tally(
        &self,
        auction_id: u64,
        principal: String,
    ) -> Result<String, ErrorObjectOwned>;

    /// A principal's fungible vault balance.
    #[method(name = "query_getBalance")]
    async fn query_get_balance(
        &self,
        asset: String,
        principal: String,
    ) -> Result<String, ErrorObjectOwned>;
}

struct GavelServer {
    state: Arc<Mutex<ChainState>>,
}

impl GavelServer {
    fn new(params: ProtocolParams) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState {
                ledger: LedgerState::new(),
                vault: Vault::new(),
                params,
                timestamp: 0,
            })),
        }
    }

    fn rpc_error(msg: &str) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, msg.to_string(), None::<()>)
    }

    /// Run one engine call against the shared state.
    fn execute(&self, sender: &str, call: AuctionCall) -> Result<Vec<EventRpc>, ErrorObjectOwned> {
        let mut state = self.state.lock();
        let ctx = CallContext {
            sender: parse_principal(sender)?,
            now: state.timestamp,
        };
        let ChainState {
            ledger,
            vault,
            params,
            ..
        } = &mut *state;
        let events = dispatch(ledger, vault, params, &ctx, call)
            .map_err(|e| Self::rpc_error(&e.to_string()))?;
        Ok(events.iter().map(EventRpc::from).collect())
    }
}

#[async_trait]
impl GavelApiServer for GavelServer {
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned> {
        let mut state = self.state.lock();
        state.timestamp = timestamp;
        info!("timestamp set to {}", timestamp);
        Ok(true)
    }

    async fn admin_advance_time(&self, seconds: u64) -> Result<u64, ErrorObjectOwned> {
        let mut state = self.state.lock();
        state.timestamp = state.timestamp.saturating_add(seconds);
        Ok(state.timestamp)
    }

    async fn admin_fund(
        &self,
        principal: String,
        asset: String,
        amount: String,
    ) -> Result<bool, ErrorObjectOwned> {
        let principal = parse_principal(&principal)?;
        let asset = parse_asset(&asset)?;
        let amount = parse_amount(&amount)?;
        let mut state = self.state.lock();
        state.vault.mint_fungible(asset, principal, amount);
        info!("funded {} with {}", hex::encode(principal), amount);
        Ok(true)
    }

    async fn admin_mint_item(
        &self,
        asset: String,
        token_id: String,
        owner: String,
    ) -> Result<bool, ErrorObjectOwned> {
        let asset = parse_asset(&asset)?;
        let token_id = parse_amount(&token_id)?;
        let owner = parse_principal(&owner)?;
        let mut state = self.state.lock();
        state.vault.mint_unique(asset, token_id, owner);
        Ok(true)
    }

    async fn auction_create(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned> {
        let call = AuctionCall::Create(translate_create(&params)?);
        let sender = params.sender.clone();
        let events = self.execute(&sender, call)?;
        match events.first() {
            Some(EventRpc::Created { auction_id, .. }) => {
                info!("created auction {}", auction_id);
                Ok(*auction_id)
            }
            _ => Err(Self::rpc_error("create produced no event")),
        }
    }

    async fn auction_bid(&self, params: BidParams) -> Result<Vec<EventRpc>, ErrorObjectOwned> {
        let amount = params.amount.as_deref().map(parse_amount).transpose()?;
        self.execute(
            &params.sender,
            AuctionCall::Bid {
                auction_id: params.auction_id,
                amount,
            },
        )
    }

    async fn auction_commit_bid(
        &self,
        params: CommitBidParams,
    ) -> Result<Vec<EventRpc>, ErrorObjectOwned> {
        self.execute(
            &params.sender,
            AuctionCall::CommitBid {
                auction_id: params.auction_id,
                commitment: parse_blob32(&params.commitment)?,
                fee_amount: parse_amount(&params.fee_amount)?,
            },
        )
    }

    async fn auction_reveal_bid(
        &self,
        params: RevealBidParams,
    ) -> Result<Vec<EventRpc>, ErrorObjectOwned> {
        self.execute(
            &params.sender,
            AuctionCall::RevealBid {
                auction_id: params.auction_id,
                amount: parse_amount(&params.amount)?,
                salt: parse_blob32(&params.salt)?,
            },
        )
    }

    async fn auction_claim(&self, params: SessionCall) -> Result<Vec<EventRpc>, ErrorObjectOwned> {
        self.execute(
            &params.sender,
            AuctionCall::Claim {
                auction_id: params.auction_id,
            },
        )
    }

    async fn auction_withdraw(
        &self,
        params: SessionCall,
    ) -> Result<Vec<EventRpc>, ErrorObjectOwned> {
        self.execute(
            &params.sender,
            AuctionCall::Withdraw {
                auction_id: params.auction_id,
            },
        )
    }

    async fn auction_cancel(
        &self,
        params: SessionCall,
    ) -> Result<Vec<EventRpc>, ErrorObjectOwned> {
        self.execute(
            &params.sender,
            AuctionCall::Cancel {
                auction_id: params.auction_id,
            },
        )
    }

    async fn chain_get_timestamp(&self) -> Result<u64, ErrorObjectOwned> {
        Ok(self.state.lock().timestamp)
    }

    async fn query_get_auction(
        &self,
        auction_id: u64,
    ) -> Result<Option<AuctionRecordRpc>, ErrorObjectOwned> {
        let state = self.state.lock();
        let tables = state.ledger.tables();
        Ok(tables.auctions.get(&auction_id).map(AuctionRecordRpc::from))
    }

    async fn query_list_auctions(&self) -> Result<Vec<AuctionRecordRpc>, ErrorObjectOwned> {
        let state = self.state.lock();
        let tables = state.ledger.tables();
        let mut records: Vec<_> = tables.auctions.values().collect();
        records.sort_by_key(|r| r.id);
        Ok(records.into_iter().map(AuctionRecordRpc::from).collect())
    }

    async fn query_get_price(&self, auction_id: u64) -> Result<String, ErrorObjectOwned> {
        let state = self.state.lock();
        let tables = state.ledger.tables();
        let record = tables
            .auctions
            .get(&auction_id)
            .ok_or_else(|| Self::rpc_error("auction not found"))?;
        let sched = record
            .schedule
            .descending()
            .ok_or_else(|| Self::rpc_error("not a reverse-Dutch auction"))?;
        Ok(dutch::current_price(sched, state.timestamp).to_string())
    }

    async fn query_get_bid_tally(
        &self,
        auction_id: u64,
        principal: String,
    ) -> Result<String, ErrorObjectOwned> {
        let principal = parse_principal(&principal)?;
        let state = self.state.lock();
        let tables = state.ledger.tables();
        Ok(tables.bid_tally(auction_id, &principal).to_string())
    }

    async fn query_get_balance(
        &self,
        asset: String,
        principal: String,
    ) -> Result<String, ErrorObjectOwned> {
        let asset = parse_asset(&asset)?;
        let principal = parse_principal(&principal)?;
        let state = self.state.lock();
        Ok(state.vault.balance(&asset, &principal).to_string())
    }
}

/// Translate flat RPC creation params into the engine's typed request.
fn translate_create(p: &CreateAuctionParams) -> Result<CreateAuction, ErrorObjectOwned> {
    let kind =
        parse_kind(&p.kind).ok_or_else(|| GavelServer::rpc_error("invalid auction kind"))?;
    let asset_kind = match p.asset_kind.as_str() {
        "unique" => AssetKind::Unique,
        "fungible" => AssetKind::Fungible,
        _ => return Err(GavelServer::rpc_error("invalid asset kind")),
    };
    let require_amount = |field: &Option<String>, name: &str| {
        field
            .as_deref()
            .ok_or_else(|| GavelServer::rpc_error(&format!("missing field: {name}")))
            .and_then(parse_amount)
    };
    let require_u64 = |field: Option<u64>, name: &str| {
        field.ok_or_else(|| GavelServer::rpc_error(&format!("missing field: {name}")))
    };

    let params = match kind {
        AuctionKind::English | AuctionKind::AllPay => CreateParams::Ascending {
            starting_bid: require_amount(&p.starting_bid, "starting_bid")?,
            min_bid_delta: require_amount(&p.min_bid_delta, "min_bid_delta")?,
            duration: require_u64(p.duration, "duration")?,
            deadline_extension: require_u64(p.deadline_extension, "deadline_extension")?,
        },
        AuctionKind::Vickrey => CreateParams::Sealed {
            min_bid: require_amount(&p.min_bid, "min_bid")?,
            commit_duration: require_u64(p.commit_duration, "commit_duration")?,
            reveal_duration: require_u64(p.reveal_duration, "reveal_duration")?,
            commit_fee: require_amount(&p.commit_fee, "commit_fee")?,
        },
        AuctionKind::LinearReverseDutch | AuctionKind::ExpReverseDutch => {
            CreateParams::Descending {
                start_price: require_amount(&p.start_price, "start_price")?,
                min_price: require_amount(&p.min_price, "min_price")?,
                duration: require_u64(p.duration, "duration")?,
                decay_factor: p.decay_factor,
            }
        }
    };

    Ok(CreateAuction {
        kind,
        name: p.name.clone(),
        asset_kind,
        asset_id: parse_asset(&p.asset_id)?,
        id_or_amount: parse_amount(&p.id_or_amount)?,
        pay_asset: parse_asset(&p.pay_asset)?,
        params,
    })
}

fn parse_principal(s: &str) -> Result<Principal, ErrorObjectOwned> {
    parse_blob32(s)
}

fn parse_asset(s: &str) -> Result<AssetId, ErrorObjectOwned> {
    parse_blob32(s)
}

/// Decode a hex string into 32 bytes, left-aligned and zero-padded.
fn parse_blob32(s: &str) -> Result<[u8; 32], ErrorObjectOwned> {
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| GavelServer::rpc_error(&format!("invalid hex: {e}")))?;
    if bytes.len() > 32 {
        return Err(GavelServer::rpc_error("value longer than 32 bytes"));
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(&bytes);
    Ok(out)
}

fn parse_amount(s: &str) -> Result<u128, ErrorObjectOwned> {
    s.parse::<u128>()
        .map_err(|e| GavelServer::rpc_error(&format!("invalid amount: {e}")))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gavel_server=info".parse().unwrap())
                .add_directive("gavel_engine=info".parse().unwrap())
                .add_directive("jsonrpsee=warn".parse().unwrap()),
        )
        .init();

    let config = Config::parse();
    let scheme = match config.commitment_scheme.as_str() {
        "keccak256" => CommitmentScheme::Keccak256,
        "sha256" => CommitmentScheme::Sha256,
        other => anyhow::bail!("unknown commitment scheme: {other}"),
    };
    let params = ProtocolParams {
        fee_bps: config.fee_bps,
        treasury: parse_principal(&config.treasury)
            .map_err(|e| anyhow::anyhow!("invalid treasury: {e:?}"))?,
        commitment_scheme: scheme,
    };

    info!("starting gavel server on {}", config.listen);

    let server = Server::builder().build(config.listen).await?;
    let handle = server.start(GavelServer::new(params).into_rpc());

    info!("gavel server running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
