//! Pin access for the Nucleo-F767ZI, exposed to the controls through [`PinIo`].

use defmt::error;
use embassy_stm32::{
    adc::{Adc, AnyAdcChannel, Resolution, SampleTime},
    gpio::{Flex, Pull},
    peripherals::ADC1,
};
use midi_dials_lib::io::{Level, PinIo, PinMode};

/// Number of analog inputs wired to potentiometers.
pub const ANALOG_PIN_CNT: usize = 4;
/// Number of digital inputs available for bank switches.
pub const DIGITAL_PIN_CNT: usize = 2;

/// The board's pins, addressed by their index in the arrays below.
pub struct Board {
    adc: Adc<'static, ADC1>,
    analog_pins: [AnyAdcChannel<ADC1>; ANALOG_PIN_CNT],
    digital_pins: [Flex<'static>; DIGITAL_PIN_CNT],
}

impl Board {
    /// Constructs a [`Board`], configuring the ADC for the 10-bit samples the controls expect.
    pub fn new(
        mut adc: Adc<'static, ADC1>,
        analog_pins: [AnyAdcChannel<ADC1>; ANALOG_PIN_CNT],
        mut digital_pins: [Flex<'static>; DIGITAL_PIN_CNT],
    ) -> Self {
        adc.set_resolution(Resolution::BITS10);
        // potentiometers have a fairly high source impedance; give the sampling capacitor time to charge
        adc.set_sample_time(SampleTime::CYCLES112);
        for pin in digital_pins.iter_mut() {
            pin.set_as_input(Pull::None);
        }
        Self {
            adc,
            analog_pins,
            digital_pins,
        }
    }
}

impl PinIo for Board {
    fn analog_read(&mut self, pin: u8) -> u16 {
        match self.analog_pins.get_mut(usize::from(pin)) {
            Some(channel) => self.adc.blocking_read(channel),
            None => {
                error!("Analog pin {} does not exist", pin);
                0
            }
        }
    }

    fn digital_read(&mut self, pin: u8) -> Level {
        match self.digital_pins.get(usize::from(pin)) {
            Some(input) if input.is_low() => Level::Low,
            Some(_) => Level::High,
            None => {
                // reading high means an unknown bank switch is treated as off
                error!("Digital pin {} does not exist", pin);
                Level::High
            }
        }
    }

    fn set_pin_mode(&mut self, pin: u8, mode: PinMode) {
        match self.digital_pins.get_mut(usize::from(pin)) {
            Some(input) => input.set_as_input(match mode {
                PinMode::Input => Pull::None,
                PinMode::InputPullUp => Pull::Up,
            }),
            None => error!("Digital pin {} does not exist", pin),
        }
    }
}
