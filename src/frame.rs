/* src/frame.rs */

use std::collections::BTreeMap;

use crate::error::Error;
use crate::reader::Reader;

const FRAME_PADDING: u64 = 0x00;
const FRAME_PING: u64 = 0x01;
const FRAME_ACK: u64 = 0x02;
const FRAME_ACK_ECN: u64 = 0x03;
const FRAME_CRYPTO: u64 = 0x06;

/// A single CRYPTO frame extracted from decrypted QUIC payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CryptoFrame {
	/// Byte offset within the crypto stream where this fragment begins.
	pub offset: u64,
	/// The raw data carried by this frame.
	pub data: Vec<u8>,
}

/// Parse the CRYPTO frames of a decrypted Initial packet payload.
///
/// PADDING (0x00) and PING (0x01) frames are silently skipped. ACK frames
/// (0x02, 0x03) are skipped by consuming their fields. Walking stops at the
/// first unrecognised frame type or at the first truncated or malformed
/// frame; the CRYPTO frames captured before that point are still returned.
#[must_use]
pub fn parse_crypto_frames(decrypted: &[u8]) -> Vec<CryptoFrame> {
	let mut r = Reader::new(decrypted);
	let mut frames = Vec::new();

	while !r.is_empty() {
		match next_frame(&mut r) {
			Ok(Some(frame)) => frames.push(frame),
			Ok(None) => {}
			Err(_e) => {
				#[cfg(feature = "tracing")]
				tracing::trace!(error = %_e, at = r.position(), "stopped walking frames");
				break;
			}
		}
	}

	frames
}

/// Read one frame, returning the CRYPTO payload if it was one.
fn next_frame(r: &mut Reader<'_>) -> Result<Option<CryptoFrame>, Error> {
	let frame_start = r.position() as u64;
	match r.read_varint()? {
		FRAME_PADDING | FRAME_PING => Ok(None),
		frame_type @ (FRAME_ACK | FRAME_ACK_ECN) => {
			skip_ack_frame(r, frame_type == FRAME_ACK_ECN)?;
			Ok(None)
		}
		FRAME_CRYPTO => {
			let offset = r.read_varint()?;
			let data = r
				.read_varint_prefixed()
				.map_err(|_| Error::TruncatedFrame {
					offset: frame_start,
				})?;
			Ok(Some(CryptoFrame {
				offset,
				data: data.to_vec(),
			}))
		}
		other => Err(Error::UnknownFrame(other)),
	}
}

/// Skip over an ACK frame by consuming all its varint fields.
///
/// Layout (RFC 9000 Section 19.3):
///   Largest Acknowledged (i), ACK Delay (i), ACK Range Count (i),
///   First ACK Range (i), { Gap (i), ACK Range Length (i) } * count,
///   [ECN Counts: ECT0 (i), ECT1 (i), ECN-CE (i)], only for type 0x03.
fn skip_ack_frame(r: &mut Reader<'_>, has_ecn: bool) -> Result<(), Error> {
	// Largest Acknowledged, ACK Delay
	r.read_varint()?;
	r.read_varint()?;
	let range_count = r.read_varint()?;
	// First ACK Range
	r.read_varint()?;

	// Each range needs at least two bytes, so a huge count fails fast.
	for _ in 0..range_count {
		r.read_varint()?;
		r.read_varint()?;
	}

	if has_ecn {
		for _ in 0..3 {
			r.read_varint()?;
		}
	}

	Ok(())
}

/// Reassemble CRYPTO frames into the contiguous stream prefix starting at
/// offset zero.
///
/// Frames are sorted by offset; frames with equal offsets keep their slice
/// order. Reassembly stops at the first gap. Bytes already covered by an
/// earlier frame are never overwritten: an overlapping frame only
/// contributes its tail past the current end. The result never exceeds
/// `max_bytes`.
#[must_use]
pub fn reassemble_crypto_stream(frames: &[CryptoFrame], max_bytes: usize) -> Vec<u8> {
	let mut sorted: Vec<&CryptoFrame> = frames.iter().collect();
	sorted.sort_by_key(|f| f.offset);
	assemble(sorted.into_iter().map(|f| (f.offset, f.data.as_slice())), max_bytes)
}

fn assemble<'a>(segments: impl Iterator<Item = (u64, &'a [u8])>, max_bytes: usize) -> Vec<u8> {
	let mut stream = Vec::new();

	for (offset, data) in segments {
		let next_offset = stream.len() as u64;
		if offset > next_offset {
			break;
		}
		let room = max_bytes - stream.len();
		if room == 0 {
			break;
		}
		let skip = usize::try_from(next_offset - offset).unwrap_or(usize::MAX);
		if let Some(tail) = data.get(skip..) {
			stream.extend_from_slice(&tail[..tail.len().min(room)]);
		}
	}

	stream
}

/// Sparse CRYPTO stream segments kept across datagrams, ordered by offset.
///
/// Segments are never removed. Equal offsets are kept in insertion order so
/// the earliest-received data wins during assembly. Nothing at or beyond
/// `max_bytes` is stored, which bounds memory no matter what offsets and
/// lengths a peer claims.
#[derive(Debug, Clone)]
pub struct CryptoBuffer {
	segments: BTreeMap<(u64, u64), Vec<u8>>,
	next_seq: u64,
	max_bytes: usize,
}

impl CryptoBuffer {
	/// Create an empty buffer that assembles at most `max_bytes`.
	#[must_use]
	pub fn new(max_bytes: usize) -> Self {
		Self {
			segments: BTreeMap::new(),
			next_seq: 0,
			max_bytes,
		}
	}

	/// Store a frame. Data past `max_bytes` is dropped on the way in.
	pub fn insert(&mut self, frame: CryptoFrame) {
		let Ok(offset) = usize::try_from(frame.offset) else {
			return;
		};
		if offset >= self.max_bytes {
			return;
		}
		let mut data = frame.data;
		data.truncate(self.max_bytes - offset);

		self.segments.insert((frame.offset, self.next_seq), data);
		self.next_seq += 1;
	}

	/// The contiguous prefix of the stream, capped at `max_bytes`.
	#[must_use]
	pub fn assemble(&self) -> Vec<u8> {
		assemble(
			self.segments
				.iter()
				.map(|(&(offset, _), data)| (offset, data.as_slice())),
			self.max_bytes,
		)
	}

	/// Number of stored segments.
	#[must_use]
	pub fn len(&self) -> usize {
		self.segments.len()
	}

	/// `true` when nothing has been stored.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	/// The assembly cap.
	#[must_use]
	pub const fn max_bytes(&self) -> usize {
		self.max_bytes
	}
}
