/* src/lib.rs */

//! Passive TLS SNI extraction from QUIC Initial packets.
//!
//! Feed the client-to-server UDP payloads of one flow, in arrival order, to
//! [`try_extract_sni`] and keep the [`FlowState`] it hands back until it
//! reports [`Outcome::Found`], [`Outcome::GiveUp`] or [`Outcome::NotInitial`].
//! Nothing is sent or terminated; the connection is only observed.
//!
//! The crate is built in three layers:
//!
//! **Layer 1: Parsing** (always available, no crypto dependency):
//! varints and the bounds-checked [`Reader`], long headers of coalesced
//! packets, CRYPTO frame walking and reassembly, and the partial
//! ClientHello parser that finds the `server_name` extension.
//!
//! **Layer 2: Decryption** (requires `ring` or `aws-lc-rs` feature):
//! derive client Initial keys and decrypt Initial packets for QUIC v1 and v2.
//!
//! **Layer 3: Flow sniffing** (requires `ring` or `aws-lc-rs` feature):
//! the resumable per-flow state machine with packet, time and memory limits.

#[cfg(all(feature = "ring", feature = "aws-lc-rs"))]
compile_error!(
	"features `ring` and `aws-lc-rs` are mutually exclusive; enable only one crypto backend"
);

mod client_hello;
mod error;
mod frame;
mod header;
mod reader;
mod varint;

#[cfg(any(feature = "ring", feature = "aws-lc-rs"))]
mod crypto;

#[cfg(any(feature = "ring", feature = "aws-lc-rs"))]
mod flow;

pub use client_hello::parse_client_hello_sni;
pub use error::Error;
pub use frame::{CryptoBuffer, CryptoFrame, parse_crypto_frames, reassemble_crypto_stream};
pub use header::{
	CoalescedPackets, LongHeader, PacketType, QUIC_V1, QUIC_V2, Version, coalesced_packets,
	parse_initial, parse_long_header,
};
pub use reader::Reader;
pub use varint::read_varint;

#[cfg(any(feature = "ring", feature = "aws-lc-rs"))]
pub use crypto::{InitialKeys, decrypt_initial};

#[cfg(any(feature = "ring", feature = "aws-lc-rs"))]
pub use flow::{Extraction, FlowState, Limits, Outcome, try_extract_sni, try_extract_sni_with};
