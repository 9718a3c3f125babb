/* demos/walk_datagram.rs */

#![allow(missing_docs)]

// Lists the long-header packets coalesced in a UDP datagram. No crypto is
// involved, so this works with `--no-default-features`.
//
// Pass a datagram in hex as the only argument, or run without arguments to
// walk a built-in Initial + Handshake pair followed by a short header.

use quic_sni::coalesced_packets;

fn main() {
	let datagram = match std::env::args().nth(1) {
		Some(arg) => hex_decode(&arg),
		None => build_sample_datagram(),
	};

	let mut packets = coalesced_packets(&datagram);
	for header in packets.by_ref() {
		println!(
			"{:>5}..{:<5} {:?} version={:#010x} dcid={} token={}B pn_offset={} length={}",
			header.start,
			header.end(),
			header.packet_type,
			header.version.wire(),
			hex(header.dcid),
			header.token.len(),
			header.pn_offset,
			header.length,
		);
	}

	match packets.stop_reason() {
		Some(e) => println!("stopped: {e}"),
		None => println!("end of datagram"),
	}
}

fn build_sample_datagram() -> Vec<u8> {
	let dcid = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
	let mut datagram = Vec::new();

	// Initial: fixed bit, type 0, empty SCID and token, 24 payload bytes.
	datagram.push(0xc0);
	datagram.extend_from_slice(&0x0000_0001u32.to_be_bytes());
	datagram.push(dcid.len() as u8);
	datagram.extend_from_slice(&dcid);
	datagram.push(0x00);
	datagram.push(0x00);
	datagram.push(24);
	datagram.extend_from_slice(&[0xaa; 24]);

	// Handshake: type 2, no token field.
	datagram.push(0xe0);
	datagram.extend_from_slice(&0x0000_0001u32.to_be_bytes());
	datagram.push(dcid.len() as u8);
	datagram.extend_from_slice(&dcid);
	datagram.push(0x00);
	datagram.push(16);
	datagram.extend_from_slice(&[0xbb; 16]);

	// 1-RTT short header, which ends the walk.
	datagram.push(0x40);
	datagram.extend_from_slice(&dcid);
	datagram.extend_from_slice(&[0xcc; 8]);

	datagram
}

fn hex(bytes: &[u8]) -> String {
	bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Vec<u8> {
	(0..s.len())
		.step_by(2)
		.map(|i| u8::from_str_radix(&s[i..i + 2], 16).expect("valid hex"))
		.collect()
}
