/* src/crypto.rs */

use aes::Aes128;
use aes::cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};

use crate::error::Error;
use crate::header::{LongHeader, Version};

const INITIAL_SALT_V1: [u8; 20] = [
	0x38, 0x76, 0x2c, 0xf7, 0xf5, 0x59, 0x34, 0xb3, 0x4d, 0x17, 0x9a, 0xe6, 0xa4, 0xc8, 0x0c, 0xad,
	0xcc, 0xbb, 0x7f, 0x0a,
];

const INITIAL_SALT_V2: [u8; 20] = [
	0x0d, 0xed, 0xe3, 0xde, 0xf7, 0x00, 0xa6, 0xdb, 0x81, 0x93, 0x81, 0xbe, 0x6e, 0x26, 0x9d, 0xcb,
	0xf9, 0xbd, 0x2e, 0xd9,
];

const KEY_LEN: usize = 16;
const IV_LEN: usize = 12;
const HP_LEN: usize = 16;
const SAMPLE_LEN: usize = 16;
const TAG_LEN: usize = 16;
// The sample is taken as if the packet number were 4 bytes long.
const SAMPLE_OFFSET: usize = 4;

struct VersionParams {
	salt: &'static [u8; 20],
	key_label: &'static [u8],
	iv_label: &'static [u8],
	hp_label: &'static [u8],
}

const fn version_params(version: Version) -> VersionParams {
	match version {
		Version::V1 => VersionParams {
			salt: &INITIAL_SALT_V1,
			key_label: b"quic key",
			iv_label: b"quic iv",
			hp_label: b"quic hp",
		},
		Version::V2 => VersionParams {
			salt: &INITIAL_SALT_V2,
			key_label: b"quicv2 key",
			iv_label: b"quicv2 iv",
			hp_label: b"quicv2 hp",
		},
	}
}

/// Client Initial packet protection keys, derived from the Destination
/// Connection ID of the client's first Initial packet.
#[derive(Clone, PartialEq, Eq)]
pub struct InitialKeys {
	key: [u8; KEY_LEN],
	iv: [u8; IV_LEN],
	hp: [u8; HP_LEN],
}

impl std::fmt::Debug for InitialKeys {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InitialKeys").finish_non_exhaustive()
	}
}

impl InitialKeys {
	/// Derive the client Initial `key`, `iv` and `hp` for `dcid`
	/// (RFC 9001 Section 5.2, RFC 9369 Section 3.3).
	///
	/// # Errors
	///
	/// Returns [`Error::DecryptionFailed`] if the HKDF backend fails.
	pub fn derive(version: Version, dcid: &[u8]) -> Result<Self, Error> {
		let params = version_params(version);
		let client_secret = backend::client_initial_secret(params.salt, dcid)?;

		let mut keys = Self {
			key: [0; KEY_LEN],
			iv: [0; IV_LEN],
			hp: [0; HP_LEN],
		};
		backend::expand_label(&client_secret, params.key_label, &mut keys.key)?;
		backend::expand_label(&client_secret, params.iv_label, &mut keys.iv)?;
		backend::expand_label(&client_secret, params.hp_label, &mut keys.hp)?;
		Ok(keys)
	}

	/// AEAD key (AES-128-GCM).
	#[must_use]
	pub const fn key(&self) -> &[u8; KEY_LEN] {
		&self.key
	}

	/// AEAD nonce base.
	#[must_use]
	pub const fn iv(&self) -> &[u8; IV_LEN] {
		&self.iv
	}

	/// Header protection key (AES-128-ECB).
	#[must_use]
	pub const fn hp(&self) -> &[u8; HP_LEN] {
		&self.hp
	}
}

fn build_hkdf_label(label: &[u8], context: &[u8], len: usize) -> Result<Vec<u8>, Error> {
	let full_label_len = 6 + label.len();
	let total = 2 + 1 + full_label_len + 1 + context.len();
	let mut out = Vec::with_capacity(total);
	let len_u16 =
		u16::try_from(len).map_err(|_| Error::DecryptionFailed("HKDF output length overflow".into()))?;
	let label_u8 = u8::try_from(full_label_len)
		.map_err(|_| Error::DecryptionFailed("HKDF label length overflow".into()))?;
	let ctx_u8 = u8::try_from(context.len())
		.map_err(|_| Error::DecryptionFailed("HKDF context length overflow".into()))?;
	out.extend_from_slice(&len_u16.to_be_bytes());
	out.push(label_u8);
	out.extend_from_slice(b"tls13 ");
	out.extend_from_slice(label);
	out.push(ctx_u8);
	out.extend_from_slice(context);
	Ok(out)
}

/// Header fields recovered by removing header protection.
struct Unprotected {
	first_byte: u8,
	pn: u64,
	pn_len: usize,
}

fn remove_header_protection(
	datagram: &[u8],
	header: &LongHeader<'_>,
	hp_key: &[u8; HP_LEN],
) -> Result<Unprotected, Error> {
	let sample_start = header.pn_offset + SAMPLE_OFFSET;
	let sample_end = sample_start + SAMPLE_LEN;
	if sample_end > header.end() {
		return Err(Error::BufferTooShort {
			need: sample_end,
			have: header.end(),
		});
	}

	let cipher =
		Aes128::new_from_slice(hp_key).map_err(|e| Error::DecryptionFailed(format!("HP key: {e}")))?;
	let mut mask = [0u8; SAMPLE_LEN];
	mask.copy_from_slice(&datagram[sample_start..sample_end]);
	cipher.encrypt_block(GenericArray::from_mut_slice(&mut mask));

	let first_byte = header.first_byte ^ (mask[0] & 0x0f);
	let pn_len = usize::from((first_byte & 0x03) + 1);

	let pn = datagram[header.pn_offset..header.pn_offset + pn_len]
		.iter()
		.zip(&mask[1..])
		.fold(0u64, |pn, (&b, &m)| (pn << 8) | u64::from(b ^ m));

	Ok(Unprotected {
		first_byte,
		pn,
		pn_len,
	})
}

/// HKDF-SHA256 and AES-128-GCM from whichever provider is enabled. Both
/// expose the same `hkdf` and `aead` modules.
mod backend {
	#[cfg(feature = "aws-lc-rs")]
	use aws_lc_rs::{aead, hkdf};
	#[cfg(feature = "ring")]
	use ring::{aead, hkdf};

	use super::IV_LEN;
	use crate::error::Error;

	const CLIENT_SECRET_LEN: usize = 32;

	struct OutputLen(usize);

	impl hkdf::KeyType for OutputLen {
		fn len(&self) -> usize {
			self.0
		}
	}

	/// `HKDF-Expand-Label(HKDF-Extract(salt, dcid), "client in", 32)`.
	pub(super) fn client_initial_secret(
		salt: &[u8],
		dcid: &[u8],
	) -> Result<[u8; CLIENT_SECRET_LEN], Error> {
		let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, salt).extract(dcid);
		let mut secret = [0u8; CLIENT_SECRET_LEN];
		fill(&prk, b"client in", &mut secret)?;
		Ok(secret)
	}

	/// Fill `out` with `HKDF-Expand-Label(secret, label, out.len())`.
	pub(super) fn expand_label(secret: &[u8], label: &[u8], out: &mut [u8]) -> Result<(), Error> {
		let prk = hkdf::Prk::new_less_safe(hkdf::HKDF_SHA256, secret);
		fill(&prk, label, out)
	}

	fn fill(prk: &hkdf::Prk, label: &[u8], out: &mut [u8]) -> Result<(), Error> {
		let info = super::build_hkdf_label(label, &[], out.len())?;
		prk.expand(&[info.as_slice()], OutputLen(out.len()))
			.and_then(|okm| okm.fill(out))
			.map_err(|_| Error::DecryptionFailed("HKDF expand failed".into()))
	}

	pub(super) fn open(
		key: &[u8],
		nonce: [u8; IV_LEN],
		aad: &[u8],
		ciphertext: &[u8],
	) -> Result<Vec<u8>, Error> {
		let key = aead::UnboundKey::new(&aead::AES_128_GCM, key)
			.map(aead::LessSafeKey::new)
			.map_err(|_| Error::DecryptionFailed("invalid AES-GCM key".into()))?;
		let mut buf = ciphertext.to_vec();
		let plaintext_len = key
			.open_in_place(
				aead::Nonce::assume_unique_for_key(nonce),
				aead::Aad::from(aad),
				&mut buf,
			)
			.map_err(|_| Error::DecryptionFailed("AEAD tag mismatch".into()))?
			.len();
		buf.truncate(plaintext_len);
		Ok(buf)
	}
}

/// Decrypt one Initial packet located by `header` inside `datagram`.
///
/// Removes header protection (AES-128-ECB over a 16-byte ciphertext sample
/// taken 4 bytes past the packet number offset), rebuilds the AAD from the
/// unprotected header, XORs the packet number into the IV, and opens the
/// payload with AES-128-GCM. Works for QUIC v1 (RFC 9001) and v2 (RFC 9369)
/// given keys derived for the matching version.
///
/// The returned bytes contain the decrypted frames (PADDING, CRYPTO, ACK, etc.).
///
/// # Errors
///
/// Returns [`Error::BufferTooShort`] if the packet runs past `datagram` or
/// is too short to sample or to hold the packet number and tag, and
/// [`Error::DecryptionFailed`] if the header offsets are inconsistent or
/// authentication fails.
pub fn decrypt_initial(
	datagram: &[u8],
	header: &LongHeader<'_>,
	keys: &InitialKeys,
) -> Result<Vec<u8>, Error> {
	if header.end() > datagram.len() {
		return Err(Error::BufferTooShort {
			need: header.end(),
			have: datagram.len(),
		});
	}
	if header.start >= header.pn_offset {
		return Err(Error::DecryptionFailed(format!(
			"packet number offset {} not past packet start {}",
			header.pn_offset, header.start
		)));
	}
	let unprotected = remove_header_protection(datagram, header, &keys.hp)?;
	let pn_len = unprotected.pn_len;
	let pn_end = header.pn_offset + pn_len;

	if header.length < pn_len + TAG_LEN {
		return Err(Error::BufferTooShort {
			need: pn_len + TAG_LEN,
			have: header.length,
		});
	}

	let mut aad = Vec::with_capacity(pn_end - header.start);
	aad.push(unprotected.first_byte);
	aad.extend_from_slice(&datagram[header.start + 1..header.pn_offset]);
	for i in 0..pn_len {
		aad.push((unprotected.pn >> (8 * (pn_len - 1 - i))) as u8);
	}

	let mut nonce = keys.iv;
	let pn_offset = IV_LEN - pn_len;
	for i in 0..pn_len {
		nonce[pn_offset + i] ^= (unprotected.pn >> (8 * (pn_len - 1 - i))) as u8;
	}

	let encrypted_payload = &datagram[pn_end..header.end()];

	#[cfg(feature = "tracing")]
	tracing::debug!(
		version = header.version.wire(),
		dcid_len = header.dcid.len(),
		pn = unprotected.pn,
		payload_len = encrypted_payload.len(),
		"decrypting QUIC Initial packet"
	);

	backend::open(&keys.key, nonce, &aad, encrypted_payload)
}
