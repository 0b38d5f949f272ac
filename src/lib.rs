//! Delegated Bitcoin Signer
//!
//! Assembles Bitcoin transactions and signed-message requests, hands every
//! private-key operation to an external signer and turns the raw signatures
//! that come back into finalized artifacts.
//!
//! # Architecture
//!
//! This crate provides:
//! - **bridge**: `RemoteSigner` trait and the messenger-backed bridge
//! - **tx**: PSBT building, per-input remote signing, finalization
//! - **message_signer**: Bitcoin signed-message signing and verification
//! - **types**: Inbound request and outbound response shapes
//! - **utils**: Hex encoding, structured logging, settings
//!
//! # Security
//!
//! No private key ever enters this crate. Hardware-backed accounts are
//! rejected before any request is built.
//!
//! # Example
//!
//! ```rust,ignore
//! use btc_delegated_signer::{ChannelTransport, MessengerBridge, TransactionSigner};
//!
//! let (transport, peer) = ChannelTransport::new(16);
//! let signer = TransactionSigner::new(MessengerBridge::new(transport));
//! let tx = signer.sign(&account, &network, &payload).await?;
//! println!("{}", tx.to_hex()?);
//! ```

pub mod bridge;
pub mod error;
pub mod message_signer;
pub mod serde_bytes;
pub mod tx;
pub mod types;
pub mod utils;

// Re-export key types for convenience
pub use bridge::{
    ChannelTransport, MessageTransport, MessengerBridge, PendingSign, RawSignature, RemoteSigner,
    SignRequest, SignResponse,
};
pub use error::{ErrorCode, ErrorDescriptor, SignerError, SignerResult, ValidationError};
pub use message_signer::MessageSigner;
pub use tx::{FinalizedTransaction, PartiallySignedTransaction, TransactionSigner, UnsignedTransaction};
pub use types::*;
pub use utils::settings::SignerSettings;
