/* src/header.rs */

use crate::error::Error;
use crate::reader::Reader;

/// Wire value of QUIC version 1 (RFC 9000).
pub const QUIC_V1: u32 = 0x0000_0001;
/// Wire value of QUIC version 2 (RFC 9369).
pub const QUIC_V2: u32 = 0x6b33_43cf;

const MAX_CID_LEN: u8 = 20;

/// QUIC versions whose Initial packets can be decrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
	/// QUIC version 1.
	V1,
	/// QUIC version 2.
	V2,
}

impl Version {
	/// Map a wire version to a supported [`Version`].
	#[must_use]
	pub const fn from_wire(version: u32) -> Option<Self> {
		match version {
			QUIC_V1 => Some(Self::V1),
			QUIC_V2 => Some(Self::V2),
			_ => None,
		}
	}

	/// The 32-bit value carried in the long header.
	#[must_use]
	pub const fn wire(self) -> u32 {
		match self {
			Self::V1 => QUIC_V1,
			Self::V2 => QUIC_V2,
		}
	}

	/// `true` for QUIC v2.
	#[must_use]
	pub const fn is_v2(self) -> bool {
		matches!(self, Self::V2)
	}
}

/// Long-header packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
	/// Initial packet, carrying the start of the TLS handshake.
	Initial,
	/// 0-RTT packet.
	ZeroRtt,
	/// Handshake packet.
	Handshake,
	/// Retry packet. Has no `Length` field.
	Retry,
}

impl PacketType {
	/// Decode the two type bits of the first byte.
	///
	/// QUIC v2 (RFC 9369) rotates the assignments: Initial = 0b01,
	/// 0-RTT = 0b10, Handshake = 0b11, Retry = 0b00.
	#[must_use]
	pub const fn from_bits(bits: u8, version: Version) -> Self {
		let bits = match version {
			Version::V1 => bits & 0x03,
			Version::V2 => bits.wrapping_sub(1) & 0x03,
		};
		match bits {
			0 => Self::Initial,
			1 => Self::ZeroRtt,
			2 => Self::Handshake,
			_ => Self::Retry,
		}
	}
}

/// One long-header packet located inside a (possibly coalesced) datagram.
///
/// Offsets are absolute positions in the datagram the header was parsed
/// from. Header protection is still in place: `first_byte` is masked and
/// the packet number starting at `pn_offset` is unreadable until removed.
#[derive(Debug, Clone, PartialEq)]
pub struct LongHeader<'a> {
	/// Offset of the first byte of this packet.
	pub start: usize,
	/// The first byte of the packet, still under header protection.
	pub first_byte: u8,
	/// Supported QUIC version.
	pub version: Version,
	/// Packet type decoded for `version`.
	pub packet_type: PacketType,
	/// Destination Connection ID bytes.
	pub dcid: &'a [u8],
	/// Token bytes. Empty for non-Initial packets or when no token was sent.
	pub token: &'a [u8],
	/// Offset of the packet number field.
	pub pn_offset: usize,
	/// The `Length` field: packet number, payload and AEAD tag.
	pub length: usize,
}

impl LongHeader<'_> {
	/// Offset one past the last byte of this packet.
	#[must_use]
	pub const fn end(&self) -> usize {
		self.pn_offset.saturating_add(self.length)
	}

	/// Bytes from the first header byte through the end of the payload.
	#[must_use]
	pub const fn total_len(&self) -> usize {
		self.end().saturating_sub(self.start)
	}

	/// `true` for Initial packets.
	#[must_use]
	pub fn is_initial(&self) -> bool {
		self.packet_type == PacketType::Initial
	}
}

/// Parse the long header of the packet starting at `start` in `datagram`.
///
/// The whole packet, as declared by its `Length` field, must fit inside
/// `datagram`. The Source Connection ID is validated and skipped.
///
/// # Errors
///
/// Returns [`Error::NotLongHeader`] for a short header,
/// [`Error::VersionNegotiation`] for version zero,
/// [`Error::UnsupportedVersion`] for anything but v1/v2,
/// [`Error::RetryPacket`] for Retry packets,
/// [`Error::InvalidCidLength`] for connection IDs over 20 bytes, and
/// [`Error::BufferTooShort`] / [`Error::InvalidVarint`] when any field or
/// the declared payload runs past the end of the datagram.
pub fn parse_long_header(datagram: &[u8], start: usize) -> Result<LongHeader<'_>, Error> {
	let mut r = Reader::at(datagram, start);

	let first_byte = r.read_u8()?;
	if (first_byte & 0x80) == 0 {
		return Err(Error::NotLongHeader);
	}

	let wire_version = r.read_u32()?;
	if wire_version == 0 {
		return Err(Error::VersionNegotiation);
	}
	let version = Version::from_wire(wire_version).ok_or(Error::UnsupportedVersion(wire_version))?;

	let packet_type = PacketType::from_bits((first_byte & 0x30) >> 4, version);
	if packet_type == PacketType::Retry {
		return Err(Error::RetryPacket);
	}

	let dcid = read_cid(&mut r)?;
	read_cid(&mut r)?;

	let token = match packet_type {
		PacketType::Initial => r.read_varint_prefixed()?,
		_ => &[],
	};

	let length = r.read_varint_len()?;
	let pn_offset = r.position();

	let end = pn_offset.checked_add(length).ok_or(Error::BufferTooShort {
		need: usize::MAX,
		have: datagram.len(),
	})?;
	if end > datagram.len() {
		return Err(Error::BufferTooShort {
			need: end,
			have: datagram.len(),
		});
	}

	Ok(LongHeader {
		start,
		first_byte,
		version,
		packet_type,
		dcid,
		token,
		pn_offset,
		length,
	})
}

/// Parse the first packet of `datagram`, accepting only an Initial packet.
///
/// This is a header sanity check; nothing is decrypted.
///
/// # Errors
///
/// Everything [`parse_long_header`] returns, plus
/// [`Error::NotInitialPacket`] for other long-header packet types.
pub fn parse_initial(datagram: &[u8]) -> Result<LongHeader<'_>, Error> {
	let header = parse_long_header(datagram, 0)?;
	if !header.is_initial() {
		return Err(Error::NotInitialPacket((header.first_byte & 0x30) >> 4));
	}
	Ok(header)
}

/// Iterate over the long-header packets coalesced in one datagram.
///
/// Yields packets at increasing offsets. Iteration ends for good at the
/// end of the datagram, at the first short-header byte, or at the first
/// packet that fails to parse; [`CoalescedPackets::stop_reason`] tells
/// which error ended it, if any.
#[must_use]
pub fn coalesced_packets(datagram: &[u8]) -> CoalescedPackets<'_> {
	CoalescedPackets {
		datagram,
		offset: 0,
		stopped: None,
		done: false,
	}
}

/// Iterator returned by [`coalesced_packets`].
#[derive(Debug)]
pub struct CoalescedPackets<'a> {
	datagram: &'a [u8],
	offset: usize,
	stopped: Option<Error>,
	done: bool,
}

impl CoalescedPackets<'_> {
	/// The error that ended iteration early, if any.
	#[must_use]
	pub fn stop_reason(&self) -> Option<&Error> {
		self.stopped.as_ref()
	}
}

impl<'a> Iterator for CoalescedPackets<'a> {
	type Item = LongHeader<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done || self.offset >= self.datagram.len() {
			self.done = true;
			return None;
		}
		match parse_long_header(self.datagram, self.offset) {
			Ok(header) => {
				self.offset = header.end();
				Some(header)
			}
			Err(e) => {
				self.done = true;
				self.stopped = Some(e);
				None
			}
		}
	}
}

impl std::iter::FusedIterator for CoalescedPackets<'_> {}

fn read_cid<'a>(r: &mut Reader<'a>) -> Result<&'a [u8], Error> {
	let mut peek = r.clone();
	let cid_len = peek.read_u8()?;
	if cid_len > MAX_CID_LEN {
		return Err(Error::InvalidCidLength(cid_len));
	}
	r.read_u8_prefixed()
}
