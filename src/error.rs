/* src/error.rs */

/// Errors that can occur while parsing, decrypting or reassembling QUIC
/// Initial packets.
///
/// The flow-level entry points never return these; they are converted into
/// "skip this packet" or into an [`Outcome`](crate::Outcome) at the point
/// they occur.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The input buffer is shorter than required.
	#[error("buffer too short: need at least {need} bytes, have {have}")]
	BufferTooShort {
		/// Minimum number of bytes required.
		need: usize,
		/// Actual number of bytes available.
		have: usize,
	},

	/// The packet does not have the long header form bit set.
	#[error("not a QUIC long header packet")]
	NotLongHeader,

	/// The long header carries version `0x00000000`.
	#[error("version negotiation packet")]
	VersionNegotiation,

	/// The QUIC version is neither v1 nor v2.
	#[error("unsupported QUIC version: {0:#010x}")]
	UnsupportedVersion(u32),

	/// The packet is a long header but not an Initial packet.
	#[error("not an Initial packet (type bits: {0:#04x})")]
	NotInitialPacket(u8),

	/// Retry packets have no `Length` field, so nothing after them can be
	/// located.
	#[error("retry packet")]
	RetryPacket,

	/// A connection ID length field exceeds the protocol maximum of 20 bytes.
	#[error("connection ID length {0} exceeds maximum of 20")]
	InvalidCidLength(u8),

	/// Header protection removal, key derivation or AEAD decryption failed.
	#[error("decryption failed: {0}")]
	DecryptionFailed(String),

	/// A frame was truncated before its declared length.
	#[error("truncated frame at offset {offset}")]
	TruncatedFrame {
		/// The byte offset within the decrypted payload where truncation occurred.
		offset: u64,
	},

	/// A frame type other than PADDING, PING, ACK or CRYPTO.
	#[error("unexpected frame type {0:#04x} in Initial packet")]
	UnknownFrame(u64),

	/// The variable-length integer encoding is malformed.
	#[error("invalid varint encoding")]
	InvalidVarint,

	/// The crypto stream does not start with a `client_hello` handshake.
	#[error("not a ClientHello (handshake type {0:#04x})")]
	NotClientHello(u8),
}
