//! The device's physical controls and the task which polls them.

use crate::{
    board::{ANALOG_PIN_CNT, Board},
    midi_out::QueueSender,
};
use defmt::info;
use embassy_time::{Duration, Ticker};
use midi_dials_lib::{
    analog::{AnalogInputChannel, Mapping},
    configuration::Offsets,
};
use wmidi::{Channel, ControlFunction, U7};

/// Added to the channel and controller number of every control. Change these to move the whole device to other
/// channels or controllers, e.g., to run two units side by side.
pub const OFFSETS: Offsets = Offsets::NONE;

/// How often every control is sampled.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Number of samples each potentiometer is averaged over.
const WINDOW_LEN: usize = 8;

/// A potentiometer whose averaging window holds up to [`WINDOW_LEN`] samples.
type Control = AnalogInputChannel<Mapping, WINDOW_LEN>;

/// Index of the toggle switch selecting the alternate bank of the first two potentiometers.
const BANK_SWITCH_A: u8 = 0;
/// Index of the toggle switch selecting the alternate bank of the last two potentiometers.
const BANK_SWITCH_B: u8 = 1;

/// The alternate destination of a control while its bank switch is on.
pub struct BankLayout {
    selector_pin: u8,
    controller: ControlFunction,
    channel: Channel,
}

/// Describes how a potentiometer is wired and where its messages go.
pub struct ControlLayout {
    /// Index into the board's analog pins.
    pin: u8,
    controller: ControlFunction,
    channel: Channel,
    /// Averaging window, if the potentiometer needs smoothing.
    window_len: Option<usize>,
    bank: Option<BankLayout>,
}

const fn cc(number: u8) -> ControlFunction {
    ControlFunction(U7::from_u8_lossy(number))
}

/// The controls, in the order of the board's analog pins. Controllers 20-23 and 24-27 are undefined by the MIDI
/// specification and therefore free for general use.
pub const CONTROLS: [ControlLayout; ANALOG_PIN_CNT] = [
    ControlLayout {
        pin: 0,
        controller: cc(20),
        channel: Channel::Ch1,
        window_len: Some(WINDOW_LEN),
        bank: Some(BankLayout {
            selector_pin: BANK_SWITCH_A,
            controller: cc(24),
            channel: Channel::Ch1,
        }),
    },
    ControlLayout {
        pin: 1,
        controller: cc(21),
        channel: Channel::Ch1,
        window_len: Some(WINDOW_LEN),
        bank: Some(BankLayout {
            selector_pin: BANK_SWITCH_A,
            controller: cc(25),
            channel: Channel::Ch1,
        }),
    },
    ControlLayout {
        pin: 2,
        controller: cc(22),
        channel: Channel::Ch1,
        window_len: Some(WINDOW_LEN),
        bank: Some(BankLayout {
            selector_pin: BANK_SWITCH_B,
            controller: cc(22),
            channel: Channel::Ch2,
        }),
    },
    ControlLayout {
        pin: 3,
        controller: cc(23),
        channel: Channel::Ch1,
        window_len: None,
        bank: None,
    },
];

impl ControlLayout {
    /// Builds the [`AnalogInputChannel`] described by this layout, enabling averaging and bank mode as needed.
    fn build(&self, board: &mut Board) -> Control {
        let mut control = Control::new(self.pin, self.controller, self.channel, OFFSETS);
        if let Some(window_len) = self.window_len {
            control.enable_averaging(window_len);
        }
        if let Some(bank) = &self.bank {
            control.enable_bank_mode(board, bank.selector_pin, bank.controller, bank.channel);
        }
        control
    }
}

/// Task responsible for sampling every control once per [`POLL_INTERVAL`].
#[embassy_executor::task]
pub async fn poll_controls(mut board: Board, mut sender: QueueSender<'static>) -> ! {
    let mut controls = CONTROLS.each_ref().map(|layout| layout.build(&mut board));
    info!("Polling {} controls", controls.len());

    let mut ticker = Ticker::every(POLL_INTERVAL);
    loop {
        for control in controls.iter_mut() {
            control.refresh(&mut board, &mut sender);
        }
        ticker.next().await;
    }
}
