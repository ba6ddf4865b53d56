//! Provides [`AnalogInputChannel`], which turns the readings of a potentiometer (or any other analog source) into
//! MIDI Control Change messages.
//!
//! Each time the channel is refreshed, the raw sample passes through three stages, always in this order:
//! a user-supplied mapping function, an optional [`RunningAverage`], and quantization from the ADC's 10 bits down to
//! MIDI's 7. A message is sent only when the quantized value differs from the one sent last, which keeps a polled
//! control from flooding the bus.

use crate::{
    configuration::{Address, Offsets},
    io::{ControlChangeSender, Level, PinIo, PinMode},
    running_average::{MAX_WINDOW_LEN, RunningAverage},
};
use wmidi::{Channel, ControlFunction, ControlValue, U7};

/// Largest value an analog sample can take at 10-bit resolution.
pub const ANALOG_MAX: u16 = 1023;

/// Number of bits dropped to go from a 10-bit sample to a 7-bit MIDI value.
const QUANTIZATION_SHIFT: u16 = 3;

/// The type of mapping function a channel starts out with.
pub type Mapping = fn(i32) -> i32;

fn identity(value: i32) -> i32 {
    value
}

/// Converts a 10-bit sample into a 7-bit MIDI value by truncation (e.g., 1023 → 127, 8 → 1, 7 → 0).
pub fn quantize(sample: u16) -> ControlValue {
    U7::from_u8_lossy((sample.min(ANALOG_MAX) >> QUANTIZATION_SHIFT) as u8)
}

/// The alternate destination of a channel, used while its bank switch is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Bank {
    /// Digital pin wired to the bank toggle switch. The switch closes the pin to ground when on.
    selector_pin: u8,
    /// Destination of messages while the switch is on.
    address: Address,
}

/// A single analog control, e.g., a potentiometer, reported over MIDI as a continuous controller.
///
/// The channel does not own any hardware. Pins are identified by number and reached through a [`PinIo`], and messages
/// leave through a [`ControlChangeSender`], both of which are passed to the methods that need them. Methods that
/// change the electrical configuration of a pin ([`enable_bank_mode`](Self::enable_bank_mode),
/// [`disable_bank_mode`](Self::disable_bank_mode), and [`detach`](Self::detach)) must be given the same board the
/// channel is refreshed with.
///
/// The averaging window is stored inline, so its capacity `N` is part of the type; the owner picks a capacity at
/// least as large as the longest window it intends to configure.
///
/// Configuration mistakes, such as asking to average over a single sample, are ignored rather than reported: the
/// channel lives inside a control loop which has no use for an error.
#[derive(Clone, Debug)]
pub struct AnalogInputChannel<M = Mapping, const N: usize = MAX_WINDOW_LEN> {
    /// Analog pin the control is wired to.
    pin: u8,
    /// Destination of messages while bank mode is off (or while the bank switch is off).
    address: Address,
    /// Device-wide shifts applied to whichever address is used.
    offsets: Offsets,
    /// Present only once averaging has been enabled.
    average: Option<RunningAverage<N>>,
    /// The value most recently sent; used to suppress duplicate messages.
    last_value: ControlValue,
    /// Present only while bank mode is enabled.
    bank: Option<Bank>,
    /// Applied to every raw sample before averaging.
    mapping: M,
}

impl<const N: usize> AnalogInputChannel<Mapping, N> {
    /// Constructs an [`AnalogInputChannel`] with no averaging, no bank, and an identity mapping.
    pub fn new(pin: u8, controller: ControlFunction, channel: Channel, offsets: Offsets) -> Self {
        Self {
            pin,
            address: Address::new(controller, channel),
            offsets,
            average: None,
            last_value: U7::from_u8_lossy(0),
            bank: None,
            mapping: identity,
        }
    }
}

impl<M: Fn(i32) -> i32, const N: usize> AnalogInputChannel<M, N> {
    /// Smooths readings with a moving average over the last `length` samples.
    ///
    /// Has no effect if `length` is 0 or 1 (there is nothing to average) or if averaging is already enabled; the
    /// window length cannot be changed once set. `length` must not exceed the capacity `N` chosen for the channel.
    pub fn enable_averaging(&mut self, length: usize) {
        if let Some(average) = &self.average {
            warn!(
                "Averaging is already enabled with a window of {} samples; ignoring new length {}",
                average.len(),
                length
            );
            return;
        }
        self.average = RunningAverage::new(length);
        if self.average.is_none() {
            warn!(
                "Cannot average over {} samples with a capacity of {}; averaging stays disabled",
                length,
                N
            );
        }
    }

    /// Replaces the function applied to every raw sample before averaging and quantization.
    ///
    /// The function receives the 10-bit reading; its output is clamped back into `0..=1023`. Samples already in the
    /// averaging window are left as they are.
    pub fn set_mapping(&mut self, mapping: M) {
        self.mapping = mapping;
    }

    /// Like [`set_mapping`](Self::set_mapping), but accepts any callable, including closures which capture state.
    pub fn with_mapping<F: Fn(i32) -> i32>(self, mapping: F) -> AnalogInputChannel<F, N> {
        AnalogInputChannel {
            pin: self.pin,
            address: self.address,
            offsets: self.offsets,
            average: self.average,
            last_value: self.last_value,
            bank: self.bank,
            mapping,
        }
    }

    /// Enables bank mode: while the switch on `selector_pin` is on (i.e., pulls the pin low), messages are sent to
    /// the alternate controller and channel instead of the regular ones.
    ///
    /// The selector pin's pull-up resistor is enabled so the line reads high while the switch is open. If bank mode
    /// was already enabled with a different selector pin, that pin is returned to a plain input first.
    pub fn enable_bank_mode<B: PinIo>(
        &mut self,
        board: &mut B,
        selector_pin: u8,
        alt_controller: ControlFunction,
        alt_channel: Channel,
    ) {
        if let Some(previous) = self.bank {
            if previous.selector_pin != selector_pin {
                board.set_pin_mode(previous.selector_pin, PinMode::Input);
            }
        }
        board.set_pin_mode(selector_pin, PinMode::InputPullUp);
        self.bank = Some(Bank {
            selector_pin,
            address: Address::new(alt_controller, alt_channel),
        });
        debug!(
            "Bank mode enabled for analog pin {} with selector pin {}",
            self.pin, selector_pin
        );
    }

    /// Disables bank mode, returning the selector pin to a plain input without the pull-up resistor.
    ///
    /// Does nothing if bank mode is not enabled.
    pub fn disable_bank_mode<B: PinIo>(&mut self, board: &mut B) {
        if let Some(bank) = self.bank.take() {
            board.set_pin_mode(bank.selector_pin, PinMode::Input);
            debug!("Bank mode disabled for analog pin {}", self.pin);
        }
    }

    /// Samples the control and sends a Control Change message if its value changed since the last message.
    ///
    /// Meant to be called once per iteration of the polling loop.
    pub fn refresh<B: PinIo, S: ControlChangeSender>(&mut self, board: &mut B, sender: &mut S) {
        let raw = board.analog_read(self.pin);
        let mapped = (self.mapping)(i32::from(raw)).clamp(0, i32::from(ANALOG_MAX)) as u16;
        let smoothed = match &mut self.average {
            Some(average) => average.push(mapped),
            None => mapped,
        };

        let value = quantize(smoothed);
        if value == self.last_value {
            return;
        }

        let address = self.current_address(board).offset_by(self.offsets);
        sender.send_control_change(address.channel, address.controller, value);
        self.last_value = value;
    }

    /// Tears the channel down, disabling bank mode so the selector pin is not left with its pull-up enabled.
    pub fn detach<B: PinIo>(mut self, board: &mut B) {
        self.disable_bank_mode(board);
    }

    /// Returns the averaging window length, or `None` if averaging is disabled.
    pub fn window_len(&self) -> Option<usize> {
        self.average.as_ref().map(RunningAverage::len)
    }

    /// Determines whether bank mode is enabled.
    pub fn is_bank_enabled(&self) -> bool {
        self.bank.is_some()
    }

    /// Returns the value most recently sent (zero before anything has been sent).
    pub fn last_value(&self) -> ControlValue {
        self.last_value
    }

    /// Returns the regular destination of the channel, before offsets are applied.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Selects the address to send to, consulting the bank switch as it is right now.
    fn current_address<B: PinIo>(&self, board: &mut B) -> Address {
        match self.bank {
            Some(bank) if board.digital_read(bank.selector_pin) == Level::Low => bank.address,
            _ => self.address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyvec::ArrayVec;

    const POT_PIN: u8 = 0;
    const SELECTOR_PIN: u8 = 3;
    const OTHER_SELECTOR_PIN: u8 = 4;

    /// Stands in for the board: a single analog reading shared by all analog pins, one level per digital pin, and a
    /// record of the last mode each digital pin was set to.
    struct MockBoard {
        analog: u16,
        levels: [Level; 8],
        modes: [Option<PinMode>; 8],
    }

    impl MockBoard {
        fn new() -> Self {
            Self {
                analog: 0,
                levels: [Level::High; 8],
                modes: [None; 8],
            }
        }
    }

    impl PinIo for MockBoard {
        fn analog_read(&mut self, _pin: u8) -> u16 {
            self.analog
        }

        fn digital_read(&mut self, pin: u8) -> Level {
            self.levels[pin as usize]
        }

        fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
            self.modes[pin as usize] = Some(mode);
        }
    }

    /// Records sent messages as (channel index, controller, value).
    #[derive(Default)]
    struct MockSender {
        sent: ArrayVec<[(u8, u8, u8); 16]>,
    }

    impl ControlChangeSender for MockSender {
        fn send_control_change(
            &mut self,
            channel: Channel,
            controller: ControlFunction,
            value: ControlValue,
        ) {
            self.sent
                .push((channel.index(), u8::from(controller), u8::from(value)));
        }
    }

    fn cc(number: u8) -> ControlFunction {
        ControlFunction(U7::from_u8_lossy(number))
    }

    fn pot() -> AnalogInputChannel {
        AnalogInputChannel::new(POT_PIN, cc(7), Channel::Ch1, Offsets::NONE)
    }

    #[test]
    fn quantize_truncates_to_seven_bits() {
        assert_eq!(U7::from_u8_lossy(127), quantize(1023));
        assert_eq!(U7::from_u8_lossy(1), quantize(8));
        assert_eq!(U7::from_u8_lossy(0), quantize(7));
        assert_eq!(U7::from_u8_lossy(64), quantize(512));
    }

    #[test]
    fn new_has_no_averaging_and_no_bank() {
        let pot = pot();
        assert_eq!(None, pot.window_len(), "Expected left but got right");
        assert!(!pot.is_bank_enabled());
        assert_eq!(U7::from_u8_lossy(0), pot.last_value());
        assert_eq!(
            Address::new(cc(7), Channel::Ch1),
            pot.address(),
            "Expected left but got right"
        );
    }

    #[test]
    fn averaging_ignores_meaningless_lengths() {
        let mut pot = pot();
        pot.enable_averaging(0);
        assert_eq!(None, pot.window_len());
        pot.enable_averaging(1);
        assert_eq!(None, pot.window_len());
    }

    #[test]
    fn averaging_ignores_lengths_beyond_capacity() {
        let mut pot = pot();
        pot.enable_averaging(MAX_WINDOW_LEN + 1);
        assert_eq!(None, pot.window_len());
    }

    #[test]
    fn capacity_is_chosen_by_owner() {
        let mut pot: AnalogInputChannel<Mapping, 64> =
            AnalogInputChannel::new(POT_PIN, cc(7), Channel::Ch1, Offsets::NONE);
        pot.enable_averaging(64);
        assert_eq!(Some(64), pot.window_len(), "Expected left but got right");
    }

    #[test]
    fn long_window_averages_over_all_samples() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot: AnalogInputChannel<Mapping, 64> =
            AnalogInputChannel::new(POT_PIN, cc(7), Channel::Ch1, Offsets::NONE);
        pot.enable_averaging(48);

        board.analog = 800;
        for _ in 0..48 {
            pot.refresh(&mut board, &mut sender);
        }
        board.analog = 0;
        pot.refresh(&mut board, &mut sender);

        // 47 samples of 800 remain in the window: 37600 / 48 = 783, which quantizes to 97
        assert_eq!(&[(0, 7, 100), (0, 7, 97)], sender.sent.as_slice());
    }

    #[test]
    fn averaging_length_cannot_change() {
        let mut pot = pot();
        pot.enable_averaging(4);
        pot.enable_averaging(16);
        assert_eq!(Some(4), pot.window_len(), "Expected left but got right");
    }

    #[test]
    fn averaging_can_be_enabled_after_rejected_attempt() {
        let mut pot = pot();
        pot.enable_averaging(1);
        pot.enable_averaging(3);
        assert_eq!(Some(3), pot.window_len(), "Expected left but got right");
    }

    #[test]
    fn sends_on_change() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot = pot();

        board.analog = 1023;
        pot.refresh(&mut board, &mut sender);

        assert_eq!(&[(0, 7, 127)], sender.sent.as_slice());
        assert_eq!(U7::from_u8_lossy(127), pot.last_value());
    }

    #[test]
    fn suppresses_unchanged_values() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot = pot();

        board.analog = 520;
        pot.refresh(&mut board, &mut sender);
        // same 7-bit value despite a different reading
        board.analog = 527;
        pot.refresh(&mut board, &mut sender);

        assert_eq!(&[(0, 7, 65)], sender.sent.as_slice());
    }

    #[test]
    fn initial_zero_is_not_sent() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot = pot();

        board.analog = 7;
        pot.refresh(&mut board, &mut sender);

        assert!(sender.sent.is_empty());
    }

    #[test]
    fn offsets_apply_to_regular_address() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot: AnalogInputChannel = AnalogInputChannel::new(POT_PIN, cc(20), Channel::Ch2, Offsets::new(3, 10));

        board.analog = 8;
        pot.refresh(&mut board, &mut sender);

        assert_eq!(&[(4, 30, 1)], sender.sent.as_slice());
    }

    #[test]
    fn averaging_smooths_readings() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot = pot();
        pot.enable_averaging(2);

        board.analog = 800;
        pot.refresh(&mut board, &mut sender);
        board.analog = 0;
        pot.refresh(&mut board, &mut sender);

        // 800 >> 3, then (800 + 0) / 2 >> 3
        assert_eq!(&[(0, 7, 100), (0, 7, 50)], sender.sent.as_slice());
    }

    #[test]
    fn mapping_is_applied_before_averaging() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot = pot();
        pot.set_mapping(|v| 1023 - v);
        pot.enable_averaging(2);

        board.analog = 0;
        pot.refresh(&mut board, &mut sender);
        board.analog = 1023;
        pot.refresh(&mut board, &mut sender);

        // inverted: 1023 >> 3, then (1023 + 0) / 2 >> 3
        assert_eq!(&[(0, 7, 127), (0, 7, 63)], sender.sent.as_slice());
    }

    #[test]
    fn new_mapping_leaves_buffered_samples_alone() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot = pot();
        pot.enable_averaging(2);

        board.analog = 800;
        pot.refresh(&mut board, &mut sender);
        pot.set_mapping(|_| 0);
        pot.refresh(&mut board, &mut sender);

        // the 800 taken before the mapping changed stays in the window: (800 + 0) / 2 >> 3
        assert_eq!(&[(0, 7, 100), (0, 7, 50)], sender.sent.as_slice());
    }

    #[test]
    fn mapping_output_is_clamped() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot = pot();

        pot.set_mapping(|v| v * 4);
        board.analog = 1000;
        pot.refresh(&mut board, &mut sender);

        pot.set_mapping(|v| v - 2000);
        pot.refresh(&mut board, &mut sender);

        assert_eq!(&[(0, 7, 127), (0, 7, 0)], sender.sent.as_slice());
    }

    #[test]
    fn capturing_mapping() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let ceiling = 511;
        let mut pot = pot().with_mapping(move |v| v.min(ceiling));

        board.analog = 1023;
        pot.refresh(&mut board, &mut sender);

        assert_eq!(&[(0, 7, 63)], sender.sent.as_slice());
    }

    #[test]
    fn enabling_bank_mode_pulls_selector_up() {
        let mut board = MockBoard::new();
        let mut pot = pot();
        pot.enable_bank_mode(&mut board, SELECTOR_PIN, cc(8), Channel::Ch2);

        assert!(pot.is_bank_enabled());
        assert_eq!(
            Some(PinMode::InputPullUp),
            board.modes[SELECTOR_PIN as usize],
            "Expected left but got right"
        );
    }

    #[test]
    fn bank_switch_on_uses_alternate_address() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot: AnalogInputChannel = AnalogInputChannel::new(POT_PIN, cc(7), Channel::Ch1, Offsets::new(1, 2));
        pot.enable_bank_mode(&mut board, SELECTOR_PIN, cc(8), Channel::Ch3);

        board.levels[SELECTOR_PIN as usize] = Level::Low;
        board.analog = 80;
        pot.refresh(&mut board, &mut sender);

        assert_eq!(&[(3, 10, 10)], sender.sent.as_slice());
        assert_eq!(U7::from_u8_lossy(10), pot.last_value());
    }

    #[test]
    fn bank_switch_off_uses_regular_address() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot: AnalogInputChannel = AnalogInputChannel::new(POT_PIN, cc(7), Channel::Ch1, Offsets::new(1, 2));
        pot.enable_bank_mode(&mut board, SELECTOR_PIN, cc(8), Channel::Ch3);

        board.analog = 80;
        pot.refresh(&mut board, &mut sender);

        assert_eq!(&[(1, 9, 10)], sender.sent.as_slice());
    }

    #[test]
    fn bank_switch_is_read_on_every_refresh() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot = pot();
        pot.enable_bank_mode(&mut board, SELECTOR_PIN, cc(8), Channel::Ch2);

        board.analog = 80;
        pot.refresh(&mut board, &mut sender);
        board.levels[SELECTOR_PIN as usize] = Level::Low;
        board.analog = 160;
        pot.refresh(&mut board, &mut sender);

        assert_eq!(&[(0, 7, 10), (1, 8, 20)], sender.sent.as_slice());
    }

    #[test]
    fn disabling_bank_mode_releases_selector() {
        let mut board = MockBoard::new();
        let mut sender = MockSender::default();
        let mut pot = pot();
        pot.enable_bank_mode(&mut board, SELECTOR_PIN, cc(8), Channel::Ch2);
        pot.disable_bank_mode(&mut board);

        assert!(!pot.is_bank_enabled());
        assert_eq!(
            Some(PinMode::Input),
            board.modes[SELECTOR_PIN as usize],
            "Expected left but got right"
        );

        // switch position no longer matters
        board.levels[SELECTOR_PIN as usize] = Level::Low;
        board.analog = 80;
        pot.refresh(&mut board, &mut sender);
        assert_eq!(&[(0, 7, 10)], sender.sent.as_slice());
    }

    #[test]
    fn disabling_bank_mode_when_never_enabled_does_nothing() {
        let mut board = MockBoard::new();
        let mut pot = pot();
        pot.disable_bank_mode(&mut board);

        assert!(!pot.is_bank_enabled());
        assert!(board.modes.iter().all(Option::is_none));
    }

    #[test]
    fn moving_bank_to_another_selector_releases_the_first() {
        let mut board = MockBoard::new();
        let mut pot = pot();
        pot.enable_bank_mode(&mut board, SELECTOR_PIN, cc(8), Channel::Ch2);
        pot.enable_bank_mode(&mut board, OTHER_SELECTOR_PIN, cc(9), Channel::Ch2);

        assert_eq!(Some(PinMode::Input), board.modes[SELECTOR_PIN as usize]);
        assert_eq!(
            Some(PinMode::InputPullUp),
            board.modes[OTHER_SELECTOR_PIN as usize]
        );
    }

    #[test]
    fn detach_releases_selector() {
        let mut board = MockBoard::new();
        let mut pot = pot();
        pot.enable_averaging(8);
        pot.enable_bank_mode(&mut board, SELECTOR_PIN, cc(8), Channel::Ch2);
        pot.detach(&mut board);

        assert_eq!(Some(PinMode::Input), board.modes[SELECTOR_PIN as usize]);
    }

    #[test]
    fn detach_without_averaging_or_bank() {
        let mut board = MockBoard::new();
        pot().detach(&mut board);
        assert!(board.modes.iter().all(Option::is_none));
    }
}
