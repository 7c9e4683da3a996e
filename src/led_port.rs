use pedal_utils::gpio::GpioRegisters;
use stm32f1xx_hal::pac::{gpioa::RegisterBlock, GPIOB};

/// Direct access to the GPIOB register bank, for bit-banging the LED strips.
pub struct LedPort {
    regs: &'static RegisterBlock,
}

impl LedPort {
    /// `LedPort::steal()` is the GPIOB register bank.
    ///
    /// # Safety
    ///
    /// The port clock must be enabled, and nothing else may write the pins handed to the strip driver.
    pub unsafe fn steal() -> Self {
        Self {
            regs: &*GPIOB::ptr(),
        }
    }
}

impl GpioRegisters for LedPort {
    fn config_low(&self) -> u32 {
        self.regs.crl.read().bits()
    }

    fn config_high(&self) -> u32 {
        self.regs.crh.read().bits()
    }

    fn set_config_low(&mut self, bits: u32) {
        self.regs.crl.write(|w| unsafe { w.bits(bits) });
    }

    fn set_config_high(&mut self, bits: u32) {
        self.regs.crh.write(|w| unsafe { w.bits(bits) });
    }

    fn set_reset(&mut self, bits: u32) {
        self.regs.bsrr.write(|w| unsafe { w.bits(bits) });
    }

    fn reset(&mut self, bits: u32) {
        self.regs.brr.write(|w| unsafe { w.bits(bits) });
    }
}
