//! The outgoing side of the USB MIDI connection.
//!
//! Controls are refreshed synchronously, but writing to the USB endpoint is asynchronous, so the two are decoupled by
//! a queue: [`QueueSender`] pushes onto it from the polling task and [`midi_out`] drains it onto the wire.

use crate::UsbDriver;
use defmt::{error, info, panic, warn};
use embassy_stm32::usb;
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{self, Receiver, Sender},
};
use embassy_usb::{class::midi::MidiClass, driver::EndpointError};
use midi_dials_lib::{io::ControlChangeSender, usb_midi::event_packet};
use wmidi::{Channel, ControlFunction, ControlValue, MidiMessage};

/// Virtual cable the device's single MIDI IN jack is exposed on.
const CABLE: u8 = 0;

/// Number of messages which may wait for the USB endpoint before new ones are dropped.
const MIDI_OUT_QUEUE_LEN: usize = 32;

/// A Control Change message waiting to be written.
#[derive(Clone, Copy)]
pub struct ControlChange {
    channel: Channel,
    controller: ControlFunction,
    value: ControlValue,
}

type MidiOutQueue = channel::Channel<CriticalSectionRawMutex, ControlChange, MIDI_OUT_QUEUE_LEN>;
pub type MidiOutSender<'a> = Sender<'a, CriticalSectionRawMutex, ControlChange, MIDI_OUT_QUEUE_LEN>;
pub type MidiOutReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, ControlChange, MIDI_OUT_QUEUE_LEN>;

/// Messages on their way from the controls to the host.
pub static MIDI_OUT_QUEUE: MidiOutQueue = channel::Channel::new();

/// [`ControlChangeSender`] which enqueues messages for the [`midi_out`] task.
///
/// Sending never waits: if the queue is full (e.g., because no host is connected), the message is dropped. Controls
/// only report changes, so the next movement of the knob brings the host back up to date.
pub struct QueueSender<'a> {
    sender: MidiOutSender<'a>,
}

impl<'a> QueueSender<'a> {
    /// Constructs a [`QueueSender`] feeding the queue behind `sender`.
    pub fn new(sender: MidiOutSender<'a>) -> Self {
        Self { sender }
    }
}

impl ControlChangeSender for QueueSender<'_> {
    fn send_control_change(
        &mut self,
        channel: Channel,
        controller: ControlFunction,
        value: ControlValue,
    ) {
        let msg = ControlChange {
            channel,
            controller,
            value,
        };
        if self.sender.try_send(msg).is_err() {
            warn!(
                "MIDI out queue full, dropping Control Change {} on channel {}",
                u8::from(controller),
                channel.number()
            );
        }
    }
}

/// Task responsible for writing queued messages to the host whenever it is connected.
#[embassy_executor::task]
pub async fn midi_out(
    mut class: MidiClass<'static, UsbDriver>,
    receiver: MidiOutReceiver<'static>,
) -> ! {
    loop {
        class.wait_connection().await;
        info!("USB connected");
        let _ = write_messages(&mut class, &receiver).await;
        info!("USB disconnected");
    }
}

#[doc(hidden)]
struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        match val {
            EndpointError::BufferOverflow => panic!("Buffer overflow"),
            EndpointError::Disabled => Disconnected {},
        }
    }
}

/// Helper function which encodes queued messages as USB-MIDI Event Packets and writes them until the host goes away.
async fn write_messages<'d, T: usb::Instance + 'd>(
    class: &mut MidiClass<'d, usb::Driver<'d, T>>,
    receiver: &MidiOutReceiver<'static>,
) -> Result<(), Disconnected> {
    loop {
        let ControlChange {
            channel,
            controller,
            value,
        } = receiver.receive().await;
        let Some(packet) = event_packet(
            CABLE,
            &MidiMessage::ControlChange(channel, controller, value),
        ) else {
            error!("Control Change could not be encoded for cable {}", CABLE);
            continue;
        };
        class.write_packet(&packet).await?;
        info!(
            "Sent Control Change {}: channel {}, value {}",
            u8::from(controller),
            channel.number(),
            u8::from(value)
        );
    }
}
