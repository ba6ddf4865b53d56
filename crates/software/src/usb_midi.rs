//! Provides encoding of MIDI messages into USB-MIDI Event Packets, the 32-bit units in which USB MIDI 1.0 devices
//! exchange messages with the host.
//!
//! Each packet starts with a header byte whose high nibble is the virtual cable number and whose low nibble is the
//! Code Index Number (CIN), which tells the receiver how many of the three remaining bytes are meaningful. For
//! channel voice messages the CIN is simply the high nibble of the status byte.

use wmidi::MidiMessage;

/// Size of a USB-MIDI Event Packet in bytes.
pub const EVENT_PACKET_LEN: usize = 4;

/// Builds a USB-MIDI Event Packet for a channel voice message.
///
/// Returns `None` for system messages (which use other Code Index Numbers) and for cable numbers above 15.
pub fn event_packet(cable: u8, msg: &MidiMessage) -> Option<[u8; EVENT_PACKET_LEN]> {
    if cable > 0x0F {
        return None;
    }
    let mut packet = [0_u8; EVENT_PACKET_LEN];
    msg.copy_to_slice(&mut packet[1..]).ok()?;

    let status = packet[1];
    if !(0x80..=0xEF).contains(&status) {
        return None;
    }
    packet[0] = (cable << 4) | (status >> 4);
    Some(packet)
}
