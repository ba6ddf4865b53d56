//! This crate contains architecture-agnostic logic for MIDI Dials, a device which turns potentiometers into
//! [MIDI](https://midi.org/midi-1-0) Control Change messages sent over USB. A physical control can optionally be paired
//! with a "bank" toggle switch so that a single knob addresses two different controllers.
//!
//! Nothing here touches hardware directly: pin access and MIDI transmission are supplied by the caller through the
//! traits in [`io`], which keeps the signal conditioning testable on the host.

#![deny(missing_docs)]
#![no_std]

#[macro_use]
mod fmt;

/// Reading, smoothing, and reporting a single analog control.
pub mod analog;

pub mod configuration;
pub mod io;
pub mod running_average;
pub mod usb_midi;
