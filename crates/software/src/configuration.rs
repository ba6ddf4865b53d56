//! This module contains the values which determine where a control's messages are addressed.

use wmidi::{Channel, ControlFunction, U7};

/// Number of MIDI channels; channel indices wrap around at this value.
const CHANNEL_CNT: u8 = 16;

/// Amounts added to every control's channel and controller number at send time.
///
/// Offsets are meant to be defined once for the whole device (e.g., as a `const` in the firmware) and handed to each
/// control when it is constructed. Controls hold a copy and never change it, so the values are effectively read-only
/// for the lifetime of the polling loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Offsets {
    /// Added to the channel index, wrapping around after channel 16.
    pub channel: u8,
    /// Added to the controller number, wrapping around after controller 127.
    pub address: u8,
}

impl Offsets {
    /// Offsets which leave addresses untouched.
    pub const NONE: Self = Self::new(0, 0);

    /// Constructs [`Offsets`].
    pub const fn new(channel: u8, address: u8) -> Self {
        Self { channel, address }
    }
}

/// The destination of a Control Change message: which controller, on which channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Address {
    /// The controller number, i.e., the "address" of the control.
    pub controller: ControlFunction,
    /// The MIDI channel.
    pub channel: Channel,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Address {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Address {{ controller: {}, channel: {} }}",
            u8::from(self.controller),
            self.channel.number()
        );
    }
}

impl Address {
    /// Constructs an [`Address`].
    pub const fn new(controller: ControlFunction, channel: Channel) -> Self {
        Self {
            controller,
            channel,
        }
    }

    /// Returns the address shifted by the given [`Offsets`].
    ///
    /// Both values wrap within their MIDI ranges: controller numbers modulo 128 and channel indices modulo 16.
    pub fn offset_by(self, offsets: Offsets) -> Self {
        let controller = u8::from(self.controller).wrapping_add(offsets.address) & 0x7F;
        let channel_index =
            (self.channel.index() as u16 + offsets.channel as u16) % CHANNEL_CNT as u16;
        Self {
            controller: ControlFunction(U7::from_u8_lossy(controller)),
            // the modulo above keeps the index in range, so the fallback is never taken
            channel: Channel::from_index(channel_index as u8).unwrap_or(self.channel),
        }
    }
}
