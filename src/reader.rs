/* src/reader.rs */

use crate::error::Error;
use crate::varint::read_varint;

/// Bounds-checked cursor over a byte slice.
///
/// Every read either returns the requested field and advances, or returns
/// [`Error::BufferTooShort`] (or [`Error::InvalidVarint`]) and leaves the
/// position where it was. `need` and `have` in the error are absolute
/// counts within the underlying buffer, not relative to the cursor.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> Reader<'a> {
	/// Start reading at the beginning of `buf`.
	#[must_use]
	pub const fn new(buf: &'a [u8]) -> Self {
		Self { buf, pos: 0 }
	}

	/// Start reading at `pos`. A position past the end behaves like an
	/// exhausted reader.
	#[must_use]
	pub const fn at(buf: &'a [u8], pos: usize) -> Self {
		Self { buf, pos }
	}

	/// Current absolute position in the underlying buffer.
	#[must_use]
	pub const fn position(&self) -> usize {
		self.pos
	}

	/// Bytes left after the current position.
	#[must_use]
	pub const fn remaining(&self) -> usize {
		self.buf.len().saturating_sub(self.pos)
	}

	/// `true` when no bytes are left.
	#[must_use]
	pub const fn is_empty(&self) -> bool {
		self.remaining() == 0
	}

	/// Take the next `n` bytes.
	///
	/// # Errors
	///
	/// Returns [`Error::BufferTooShort`] when fewer than `n` bytes remain.
	pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
		let end = self.pos.checked_add(n).ok_or(Error::BufferTooShort {
			need: usize::MAX,
			have: self.buf.len(),
		})?;
		let bytes = self.buf.get(self.pos..end).ok_or(Error::BufferTooShort {
			need: end,
			have: self.buf.len(),
		})?;
		self.pos = end;
		Ok(bytes)
	}

	/// Advance past `n` bytes without looking at them.
	///
	/// # Errors
	///
	/// Returns [`Error::BufferTooShort`] when fewer than `n` bytes remain.
	pub fn skip(&mut self, n: usize) -> Result<(), Error> {
		self.read_bytes(n).map(|_| ())
	}

	/// Read one byte.
	///
	/// # Errors
	///
	/// Returns [`Error::BufferTooShort`] at the end of the buffer.
	pub fn read_u8(&mut self) -> Result<u8, Error> {
		Ok(self.read_array::<1>()?[0])
	}

	/// Read a big-endian `u16`.
	///
	/// # Errors
	///
	/// Returns [`Error::BufferTooShort`] when fewer than 2 bytes remain.
	pub fn read_u16(&mut self) -> Result<u16, Error> {
		self.read_array().map(u16::from_be_bytes)
	}

	/// Read a big-endian 24-bit integer, as used by TLS handshake headers.
	///
	/// # Errors
	///
	/// Returns [`Error::BufferTooShort`] when fewer than 3 bytes remain.
	pub fn read_u24(&mut self) -> Result<u32, Error> {
		let [a, b, c] = self.read_array()?;
		Ok(u32::from_be_bytes([0, a, b, c]))
	}

	/// Read a big-endian `u32`.
	///
	/// # Errors
	///
	/// Returns [`Error::BufferTooShort`] when fewer than 4 bytes remain.
	pub fn read_u32(&mut self) -> Result<u32, Error> {
		self.read_array().map(u32::from_be_bytes)
	}

	/// Read a QUIC variable-length integer.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidVarint`] when the encoding is cut short.
	pub fn read_varint(&mut self) -> Result<u64, Error> {
		let rest = self.buf.get(self.pos..).ok_or(Error::InvalidVarint)?;
		let (val, len) = read_varint(rest)?;
		self.pos += len;
		Ok(val)
	}

	/// Read a field prefixed by a one-byte length.
	///
	/// # Errors
	///
	/// Returns [`Error::BufferTooShort`] when the length or body is cut short.
	pub fn read_u8_prefixed(&mut self) -> Result<&'a [u8], Error> {
		self.prefixed(|r| r.read_u8().map(usize::from))
	}

	/// Read a field prefixed by a big-endian two-byte length.
	///
	/// # Errors
	///
	/// Returns [`Error::BufferTooShort`] when the length or body is cut short.
	pub fn read_u16_prefixed(&mut self) -> Result<&'a [u8], Error> {
		self.prefixed(|r| r.read_u16().map(usize::from))
	}

	/// Read a field prefixed by a varint length.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidVarint`] or [`Error::BufferTooShort`] when the
	/// length or body is cut short.
	pub fn read_varint_prefixed(&mut self) -> Result<&'a [u8], Error> {
		self.prefixed(|r| r.read_varint_len())
	}

	/// Read a varint that counts bytes in this buffer.
	pub(crate) fn read_varint_len(&mut self) -> Result<usize, Error> {
		let val = self.read_varint()?;
		usize::try_from(val).map_err(|_| Error::BufferTooShort {
			need: usize::MAX,
			have: self.buf.len(),
		})
	}

	fn read_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
		let bytes = self.read_bytes(N)?;
		let mut out = [0u8; N];
		out.copy_from_slice(bytes);
		Ok(out)
	}

	// Rewinds on failure so a half-read prefix never moves the cursor.
	fn prefixed(
		&mut self,
		read_len: impl FnOnce(&mut Self) -> Result<usize, Error>,
	) -> Result<&'a [u8], Error> {
		let start = self.pos;
		let body = read_len(self).and_then(|len| self.read_bytes(len));
		if body.is_err() {
			self.pos = start;
		}
		body
	}
}
