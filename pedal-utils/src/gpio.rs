//! The register bank of one GPIO port, as seen by the LED strip driver.
//!
//! The layout is the one found on STM32F1 parts: two packed configuration registers holding a 4 bit mode field per
//! pin, a bit set/reset register and a bit reset register.

/// The number of pins in one GPIO port.
pub const PINS_PER_PORT: u8 = 16;

/// Mode field for a general purpose push-pull output at the fastest slew rate (CNF = 00, MODE = 11).
pub const MODE_OUTPUT_50MHZ: u32 = 0b0011;

/// Width of one pin's mode field in the configuration registers.
const MODE_FIELD_BITS: u32 = 4;

/// Raw access to the memory mapped registers of one GPIO port.
///
/// Implementations must perform each write as a single store, the strip driver relies on the order and count of the
/// writes for its timing.
pub trait GpioRegisters {
    /// `regs.config_low()` is the current value of the configuration register for pins 0..7
    fn config_low(&self) -> u32;

    /// `regs.config_high()` is the current value of the configuration register for pins 8..15
    fn config_high(&self) -> u32;

    /// `regs.set_config_low(v)` writes the configuration register for pins 0..7
    fn set_config_low(&mut self, bits: u32);

    /// `regs.set_config_high(v)` writes the configuration register for pins 8..15
    fn set_config_high(&mut self, bits: u32);

    /// `regs.set_reset(v)` writes the bit set/reset register.
    ///
    /// A 1 in bit `n` (0..15) drives pin `n` high, a 1 in bit `n + 16` drives pin `n` low.
    fn set_reset(&mut self, bits: u32);

    /// `regs.reset(v)` writes the bit reset register, a 1 in bit `n` drives pin `n` low.
    fn reset(&mut self, bits: u32);

    /// `regs.configure_output(pin)` makes `pin` a high speed push-pull output, driven low.
    ///
    /// Pins outside of the port are ignored.
    fn configure_output(&mut self, pin: u8) {
        if pin >= PINS_PER_PORT {
            return;
        }

        self.reset(1 << pin);

        let shift = u32::from(pin % 8) * MODE_FIELD_BITS;
        let field = 0xF << shift;
        let mode = MODE_OUTPUT_50MHZ << shift;

        if pin < 8 {
            let bits = (self.config_low() & !field) | mode;
            self.set_config_low(bits);
        } else {
            let bits = (self.config_high() & !field) | mode;
            self.set_config_high(bits);
        }
    }
}
