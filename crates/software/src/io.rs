//! This module provides the traits through which controls reach the outside world: the pins they read from and the
//! MIDI transport they send to.
//!
//! Both are deliberately infallible. A control is serviced from a tight polling loop where there is nobody to report
//! an error to; implementations should log and substitute a neutral value instead.

use wmidi::{Channel, ControlFunction, ControlValue};

/// Logic level of a digital input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// The pin reads logic low, e.g., a switch closed to ground.
    Low,
    /// The pin reads logic high.
    High,
}

/// Electrical configuration of a digital input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Plain (floating) input.
    Input,
    /// Input with the internal pull-up resistor enabled, so that an unconnected line reads high.
    InputPullUp,
}

/// Access to the board's pins, addressed by numeric identifiers.
pub trait PinIo {
    /// Returns the current sample of an analog input, at 10-bit resolution (i.e., in the range `0..=1023`).
    fn analog_read(&mut self, pin: u8) -> u16;

    /// Returns the logic level of a digital input.
    fn digital_read(&mut self, pin: u8) -> Level;

    /// Changes the electrical configuration of a digital pin.
    fn set_pin_mode(&mut self, pin: u8, mode: PinMode);
}

/// A MIDI transport capable of sending Control Change messages.
///
/// Implementations are expected to return quickly; any buffering or back-pressure is theirs to handle.
pub trait ControlChangeSender {
    /// Transmits a Control Change message.
    fn send_control_change(
        &mut self,
        channel: Channel,
        controller: ControlFunction,
        value: ControlValue,
    );
}
