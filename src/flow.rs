/* src/flow.rs */

use std::time::{Duration, Instant};

use crate::client_hello::parse_client_hello_sni;
use crate::crypto::{InitialKeys, decrypt_initial};
use crate::frame::{CryptoBuffer, parse_crypto_frames};
use crate::header::{LongHeader, Version, coalesced_packets, parse_initial};

/// Resource limits applied to a flow when its state is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
	/// Calls carrying a matching Initial packet a flow may consume.
	pub packet_budget: i32,
	/// Time after the first packet at which the flow is abandoned. A timeout
	/// too large to add to the creation instant never expires.
	pub timeout: Duration,
	/// Cap on the reassembled crypto stream.
	pub max_bytes: usize,
}

impl Default for Limits {
	fn default() -> Self {
		Self {
			packet_budget: 3,
			timeout: Duration::from_millis(300),
			max_bytes: 64 * 1024,
		}
	}
}

/// What a call to [`try_extract_sni`] concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	/// The first datagram of the flow is not a QUIC v1/v2 Initial packet.
	NotInitial,
	/// More datagrams are needed; keep the returned state.
	NeedMore,
	/// The SNI was extracted.
	Found,
	/// Budget or deadline ran out before an SNI was found.
	GiveUp,
}

/// Result of one call to [`try_extract_sni`].
///
/// Only [`Extraction::NeedMore`] hands the flow state back; every other
/// variant is terminal and the state is gone.
#[derive(Debug)]
#[must_use]
pub enum Extraction {
	/// See [`Outcome::NotInitial`].
	NotInitial,
	/// See [`Outcome::NeedMore`]. Pass the state to the next call for this flow.
	NeedMore(FlowState),
	/// See [`Outcome::Found`].
	Found(String),
	/// See [`Outcome::GiveUp`].
	GiveUp,
}

impl Extraction {
	/// The outcome without its payload.
	#[must_use]
	pub const fn outcome(&self) -> Outcome {
		match self {
			Self::NotInitial => Outcome::NotInitial,
			Self::NeedMore(_) => Outcome::NeedMore,
			Self::Found(_) => Outcome::Found,
			Self::GiveUp => Outcome::GiveUp,
		}
	}

	/// The extracted server name, only for [`Extraction::Found`].
	#[must_use]
	pub fn sni(&self) -> Option<&str> {
		match self {
			Self::Found(sni) => Some(sni.as_str()),
			_ => None,
		}
	}

	/// The state to resupply, only for [`Extraction::NeedMore`].
	#[must_use]
	pub fn into_state(self) -> Option<FlowState> {
		match self {
			Self::NeedMore(state) => Some(state),
			_ => None,
		}
	}

	/// `true` for every outcome but [`Outcome::NeedMore`].
	#[must_use]
	pub const fn is_terminal(&self) -> bool {
		!matches!(self, Self::NeedMore(_))
	}
}

/// Per-flow sniffing state carried between datagrams.
///
/// Owned by whoever tracks the UDP flow and moved into each call. The
/// version and DCID come from the flow's first Initial packet and never
/// change; keys are derived once; stored crypto segments only grow and the
/// packet budget only shrinks.
#[derive(Debug)]
pub struct FlowState {
	version: Version,
	dcid: Vec<u8>,
	keys: Option<InitialKeys>,
	crypto: CryptoBuffer,
	packet_budget: i32,
	deadline: Option<Instant>,
}

impl FlowState {
	fn new(header: &LongHeader<'_>, now: Instant, limits: &Limits) -> Self {
		Self {
			version: header.version,
			dcid: header.dcid.to_vec(),
			keys: None,
			crypto: CryptoBuffer::new(limits.max_bytes),
			packet_budget: limits.packet_budget,
			deadline: now.checked_add(limits.timeout),
		}
	}

	/// QUIC version of the flow.
	#[must_use]
	pub const fn version(&self) -> Version {
		self.version
	}

	/// Destination Connection ID of the flow's first Initial packet.
	#[must_use]
	pub fn dcid(&self) -> &[u8] {
		&self.dcid
	}

	/// Calls carrying a matching Initial packet still allowed.
	#[must_use]
	pub const fn packets_remaining(&self) -> i32 {
		self.packet_budget
	}

	/// Instant after which the flow is abandoned, `None` if it never expires.
	#[must_use]
	pub const fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Cap on the reassembled crypto stream.
	#[must_use]
	pub const fn max_bytes(&self) -> usize {
		self.crypto.max_bytes()
	}

	/// CRYPTO segments collected so far.
	#[must_use]
	pub fn segment_count(&self) -> usize {
		self.crypto.len()
	}

	fn exhausted(&self, now: Instant) -> bool {
		self.packet_budget <= 0 || self.expired(now)
	}

	fn expired(&self, now: Instant) -> bool {
		self.deadline.is_some_and(|deadline| now > deadline)
	}

	/// Decrypt every Initial packet of this flow coalesced in `datagram`
	/// and store their CRYPTO frames. Returns whether any packet matched.
	fn absorb(&mut self, datagram: &[u8]) -> bool {
		let mut matched = false;
		let mut packets = coalesced_packets(datagram);

		for header in packets.by_ref() {
			if !header.is_initial() || header.version != self.version || header.dcid != self.dcid {
				#[cfg(feature = "tracing")]
				tracing::trace!(
					start = header.start,
					packet_type = ?header.packet_type,
					"skipping packet of another flow or type"
				);
				continue;
			}
			matched = true;

			if self.keys.is_none() {
				match InitialKeys::derive(self.version, &self.dcid) {
					Ok(keys) => self.keys = Some(keys),
					Err(_e) => {
						#[cfg(feature = "tracing")]
						tracing::debug!(error = %_e, "initial key derivation failed");
						continue;
					}
				}
			}
			let Some(keys) = self.keys.as_ref() else {
				continue;
			};

			match decrypt_initial(datagram, &header, keys) {
				Ok(plaintext) => {
					for frame in parse_crypto_frames(&plaintext) {
						self.crypto.insert(frame);
					}
				}
				Err(_e) => {
					#[cfg(feature = "tracing")]
					tracing::trace!(error = %_e, start = header.start, "could not decrypt Initial packet");
				}
			}
		}

		#[cfg(feature = "tracing")]
		if let Some(reason) = packets.stop_reason() {
			tracing::trace!(error = %reason, "stopped walking coalesced packets");
		}

		matched
	}
}

/// Try to extract the TLS SNI from the next client-to-server UDP payload of
/// a flow, using [`Limits::default`] for a new flow.
///
/// Pass `None` as `state` for the first datagram of a flow and the state from
/// the previous [`Extraction::NeedMore`] afterwards. `now` is supplied by the
/// caller; the flow is abandoned once it is later than the deadline set when
/// the state was created.
pub fn try_extract_sni(payload: &[u8], state: Option<FlowState>, now: Instant) -> Extraction {
	try_extract_sni_with(payload, state, now, &Limits::default())
}

/// [`try_extract_sni`] with explicit limits for a newly created flow.
///
/// `limits` only matters when `state` is `None`; an existing state keeps
/// the limits it was created with.
pub fn try_extract_sni_with(
	payload: &[u8],
	state: Option<FlowState>,
	now: Instant,
	limits: &Limits,
) -> Extraction {
	let mut state = match state {
		Some(state) => state,
		None => match parse_initial(payload) {
			Ok(header) => {
				#[cfg(feature = "tracing")]
				tracing::debug!(
					version = header.version.wire(),
					dcid_len = header.dcid.len(),
					"tracking new QUIC flow"
				);
				FlowState::new(&header, now, limits)
			}
			Err(_e) => {
				#[cfg(feature = "tracing")]
				tracing::trace!(error = %_e, "first datagram is not a QUIC Initial");
				return Extraction::NotInitial;
			}
		},
	};

	if state.exhausted(now) {
		return give_up(&state, now);
	}

	if state.absorb(payload) {
		state.packet_budget = state.packet_budget.saturating_sub(1);
	}

	if let Some(sni) = parse_client_hello_sni(&state.crypto.assemble()) {
		#[cfg(feature = "tracing")]
		tracing::debug!(sni = %sni, "extracted SNI from QUIC Initial");
		return Extraction::Found(sni);
	}

	if state.exhausted(now) {
		return give_up(&state, now);
	}

	Extraction::NeedMore(state)
}

fn give_up(_state: &FlowState, _now: Instant) -> Extraction {
	#[cfg(feature = "tracing")]
	tracing::debug!(
		budget = _state.packet_budget,
		expired = _state.expired(_now),
		segments = _state.crypto.len(),
		"giving up on QUIC flow"
	);
	Extraction::GiveUp
}
