/* tests/reader.rs */

#![allow(missing_docs)]

use quic_sni::{Error, Reader, read_varint};

// RFC 9000 Appendix A.1 sample encodings.

#[test]
fn varint_rfc9000_samples() {
	let cases: [(&[u8], u64, usize); 5] = [
		(&[0x25], 37, 1),
		(&[0x40, 0x25], 37, 2),
		(&[0x7b, 0xbd], 15_293, 2),
		(&[0x9d, 0x7f, 0x3e, 0x7d], 494_878_333, 4),
		(
			&[0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c],
			151_288_809_941_952_652,
			8,
		),
	];
	for (encoded, val, len) in cases {
		assert_eq!(read_varint(encoded).unwrap(), (val, len), "{encoded:02x?}");
	}
}

#[test]
fn varint_max_value() {
	let (val, len) = read_varint(&[0xff; 8]).unwrap();
	assert_eq!(val, (1 << 62) - 1);
	assert_eq!(len, 8);
}

#[test]
fn varint_ignores_trailing_bytes() {
	assert_eq!(read_varint(&[0x25, 0xff, 0xff]).unwrap(), (37, 1));
}

#[test]
fn varint_truncated() {
	let truncated: [&[u8]; 4] = [&[], &[0x40], &[0x80, 0x01, 0x02], &[0xc0, 0, 0, 0, 0, 0, 0]];
	for encoded in truncated {
		assert!(matches!(read_varint(encoded), Err(Error::InvalidVarint)));
	}
}

#[test]
fn reader_fixed_width_fields() {
	let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a];
	let mut r = Reader::new(&buf);
	assert_eq!(r.read_u8().unwrap(), 0x01);
	assert_eq!(r.read_u16().unwrap(), 0x0203);
	assert_eq!(r.read_u24().unwrap(), 0x04_0506);
	assert_eq!(r.read_u32().unwrap(), 0x0708_090a);
	assert!(r.is_empty());
	assert_eq!(r.position(), buf.len());
}

#[test]
fn reader_varint_advances_by_encoded_length() {
	let mut r = Reader::new(&[0x7b, 0xbd, 0x25]);
	assert_eq!(r.read_varint().unwrap(), 15_293);
	assert_eq!(r.position(), 2);
	assert_eq!(r.read_varint().unwrap(), 37);
	assert!(r.is_empty());
}

#[test]
fn reader_length_prefixed_fields() {
	let buf = [0x02, b'a', b'b', 0x00, 0x01, b'c', 0x41, 0x00, 0xff];
	let mut r = Reader::new(&buf);
	assert_eq!(r.read_u8_prefixed().unwrap(), b"ab");
	assert_eq!(r.read_u16_prefixed().unwrap(), b"c");
	// Varint length 256 but only one byte left.
	assert!(matches!(
		r.read_varint_prefixed(),
		Err(Error::BufferTooShort { .. })
	));
	assert_eq!(r.remaining(), 3);
}

#[test]
fn reader_skip_past_end_fails_without_moving() {
	let mut r = Reader::new(&[0u8; 4]);
	r.skip(3).unwrap();
	assert!(matches!(
		r.skip(2),
		Err(Error::BufferTooShort { need: 5, have: 4 })
	));
	assert_eq!(r.position(), 3);
}

#[test]
fn reader_huge_skip_does_not_overflow() {
	let mut r = Reader::at(&[0u8; 4], 2);
	assert!(r.read_bytes(usize::MAX).is_err());
	assert_eq!(r.position(), 2);
}
