/* src/client_hello.rs */

use crate::error::Error;
use crate::reader::Reader;

const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
const EXTENSION_SERVER_NAME: u16 = 0x0000;
const NAME_TYPE_HOST_NAME: u8 = 0x00;

// legacy_version (2) + random (32)
const FIXED_PREFIX_LEN: usize = 34;

/// Extract the `host_name` from the `server_name` extension of a TLS 1.3
/// ClientHello at the start of a (possibly incomplete) crypto stream.
///
/// Only the bytes that are already available are examined, bounded by the
/// declared handshake length, so the name is found as soon as the
/// `server_name` extension has fully arrived even if later extensions have
/// not. The name is decoded as ASCII, with any other byte replaced by `?`,
/// and may be empty. Returns `None` when the stream is not yet long enough,
/// when the message is malformed or when no `server_name` extension is
/// present. These cases are not told apart.
#[must_use]
pub fn parse_client_hello_sni(stream: &[u8]) -> Option<String> {
	match find_server_name(stream) {
		Ok(name) => name,
		Err(_e) => {
			#[cfg(feature = "tracing")]
			tracing::trace!(error = %_e, available = stream.len(), "no SNI in crypto stream yet");
			None
		}
	}
}

fn find_server_name(stream: &[u8]) -> Result<Option<String>, Error> {
	let mut r = Reader::new(stream);

	let msg_type = r.read_u8()?;
	if msg_type != HANDSHAKE_CLIENT_HELLO {
		return Err(Error::NotClientHello(msg_type));
	}
	let declared = r.read_u24()? as usize;
	let body_end = stream.len().min(r.position() + declared);
	let mut r = Reader::at(&stream[..body_end], r.position());

	r.skip(FIXED_PREFIX_LEN)?;
	// legacy_session_id, cipher_suites, legacy_compression_methods
	r.read_u8_prefixed()?;
	r.read_u16_prefixed()?;
	r.read_u8_prefixed()?;

	let declared_extensions = usize::from(r.read_u16()?);
	let extensions_end = body_end.min(r.position() + declared_extensions);
	let mut exts = Reader::at(&stream[..extensions_end], r.position());

	while !exts.is_empty() {
		let ext_type = exts.read_u16()?;
		let ext_data = exts.read_u16_prefixed()?;
		if ext_type == EXTENSION_SERVER_NAME {
			return host_name(ext_data);
		}
	}

	Ok(None)
}

/// Walk a `ServerNameList` and return the first `host_name` entry.
fn host_name(ext_data: &[u8]) -> Result<Option<String>, Error> {
	let mut r = Reader::new(ext_data);
	let list = r.read_u16_prefixed()?;
	let mut names = Reader::new(list);

	while !names.is_empty() {
		let name_type = names.read_u8()?;
		let name = names.read_u16_prefixed()?;
		if name_type == NAME_TYPE_HOST_NAME {
			return Ok(Some(decode_ascii(name)));
		}
	}

	Ok(None)
}

fn decode_ascii(name: &[u8]) -> String {
	name.iter()
		.map(|&b| if b.is_ascii() { char::from(b) } else { '?' })
		.collect()
}
