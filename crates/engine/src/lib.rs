//! Multi-protocol auction engine.
//!
//! Hosts concurrent auction sessions over escrowed assets under five
//! protocols: English, all-pay, sealed-bid second-price (Vickrey), and
//! linear/exponential reverse-Dutch. Custody, identity, time, and protocol
//! parameters are external capabilities; the engine owns only the auction
//! table and its escrow accounting.
//!
//! Every operation runs state-first, side-effect-second: the ledger is
//! mutated and the intended asset movements recorded under an exclusive
//! borrow, the borrow is dropped, and only then is the asset gateway driven.
//! A re-entrant call from the gateway observes the already-committed state.

pub mod ascending;
pub mod call;
pub mod context;
pub mod dispatch;
pub mod dutch;
pub mod error;
pub mod fees;
pub mod gateway;
pub mod ledger;
pub mod vickrey;

#[cfg(test)]
pub(crate) mod testutil;

pub use call::{AuctionCall, CreateAuction, CreateParams};
pub use context::{CallContext, ProtocolParams};
pub use dispatch::dispatch;
pub use error::{AuctionError, EngineResult};
pub use gateway::{AssetGateway, Effect, EscrowOp, GatewayError};
pub use ledger::LedgerState;
