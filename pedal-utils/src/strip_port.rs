//! # Parallel APA102 strip driver
//!
//! Up to eight APA102 style LED strips hang off one GPIO port, each with its own data pin and a clock pin which may
//! or may not be shared with other strips. The strips are bit-banged in lock-step: every call to `update()` clocks
//! one byte, MSB first, out of every strip that has data, with all strips receiving the same bit position on the same
//! clock pulse.
//!
//! Pin states are driven through the bit set/reset register. At configuration time each strip gets a mask selecting
//! the set bit and the reset bit of its data pin. At transmission time the strip's current byte is expanded to a
//! pattern holding the byte in the low half and its complement in the high half, rotated so that the bit being sent
//! lines up with the data pin. ANDing the pattern with the mask gives a single register value that drives the data
//! pin high or low, whichever the bit calls for, without disturbing any other pin.
//!
//! Two transmit routines exist:
//!
//! * while only strips 0..3 are configured, a fully unrolled sequence with the rotation for each bit fixed per write,
//! which gives the most regular timing
//!
//! * once any of strips 4..7 is configured, a loop over the 8 bit positions which rotates every pattern by one step
//! per iteration, keeping code size down
//!
//! Buffers are borrowed, never copied. A strip holds on to its buffer until the last byte has been clocked out.

use crate::gpio::{GpioRegisters, PINS_PER_PORT};

/// The number of strips one port can drive.
pub const MAX_STRIPS: usize = 8;

/// Strips below this index are served by the unrolled transmit routine.
const UNROLLED_STRIPS: usize = 4;

/// Selects bit `n` (set) and bit `n + 16` (reset) of the set/reset register once shifted up by the data pin `n`.
const SET_AND_RESET: u32 = 0x0001_0001;

/// One rotation step, moves the next lower bit of the byte onto the data pin.
const NEXT_BIT: u32 = 31;

/// Pins of a configured strip.
#[derive(Clone, Copy)]
struct Pins {
    data: u8,
    clock: u8,

    /// Right rotation which takes bit 7 of a pattern to the data pin
    rotate: u32,
}

/// One strip's configuration and transmission state.
#[derive(Clone, Copy)]
struct Slot<'a> {
    /// `None` until the strip is configured
    pins: Option<Pins>,

    /// Set/reset mask for the data pin, zero while idle
    mask: u32,

    /// Bytes still to be sent
    data: &'a [u8],
}

impl<'a> Slot<'a> {
    const EMPTY: Slot<'static> = Slot {
        pins: None,
        mask: 0,
        data: &[],
    };

    fn is_configured(&self) -> bool {
        self.pins.is_some()
    }

    fn is_busy(&self) -> bool {
        !self.data.is_empty()
    }

    fn clock_bit(&self) -> u32 {
        match self.pins {
            Some(pins) if self.is_busy() => 1 << pins.clock,
            _ => 0,
        }
    }

    /// `slot.pattern()` is the current byte expanded and rotated into position for its first bit
    fn pattern(&self) -> u32 {
        let byte = u32::from(self.data.first().copied().unwrap_or(0));
        let rotate = self.pins.map_or(0, |pins| pins.rotate);
        (byte | ((byte ^ 0xFF) << 16)).rotate_right(rotate)
    }

    fn release(&mut self) {
        self.mask = 0;
        self.data = &[];
    }
}

/// The strips attached to one GPIO port are represented here.
pub struct StripPort<'a, R> {
    regs: R,
    slots: [Slot<'a>; MAX_STRIPS],

    /// Clock pins of every strip with data pending
    clock_mask: u32,

    /// True once a strip outside of the unrolled range is configured
    wide: bool,
}

impl<'a, R: GpioRegisters> StripPort<'a, R> {
    /// `StripPort::new(regs)` is a new port with no strips configured.
    ///
    /// # Arguments:
    ///
    /// * `regs` - The register bank of the GPIO port, exclusively owned by the strip port from here on
    pub fn new(regs: R) -> Self {
        Self {
            regs,
            slots: [Slot::EMPTY; MAX_STRIPS],
            clock_mask: 0,
            wide: false,
        }
    }

    /// `port.configure_strip(s, d, c)` sets up strip `s` with data on pin `d` and clock on pin `c`.
    ///
    /// Both pins become outputs, driven low. Out of range strip or pin numbers are ignored. Any data still pending on
    /// the strip is dropped.
    ///
    /// # Arguments:
    ///
    /// * `strip` - The strip number, `0..MAX_STRIPS`
    ///
    /// * `data_pin` - The pin number within the port for the data line
    ///
    /// * `clock_pin` - The pin number within the port for the clock line, may be shared with other strips
    pub fn configure_strip(&mut self, strip: usize, data_pin: u8, clock_pin: u8) {
        if strip >= MAX_STRIPS || data_pin >= PINS_PER_PORT || clock_pin >= PINS_PER_PORT {
            return;
        }

        self.regs.configure_output(data_pin);
        self.regs.configure_output(clock_pin);

        self.slots[strip] = Slot {
            pins: Some(Pins {
                data: data_pin,
                clock: clock_pin,
                rotate: (32 - u32::from(data_pin) + 7) % 32,
            }),
            ..Slot::EMPTY
        };
        self.clock_mask = self.busy_clock_mask();
        self.wide |= strip >= UNROLLED_STRIPS;
    }

    /// `port.write_strip(s, buf)` queues `buf` for transmission on strip `s`, true iff it was accepted.
    ///
    /// Only configured strips with nothing pending accept a write. An empty buffer is accepted and leaves the strip
    /// idle.
    ///
    /// # Arguments:
    ///
    /// * `strip` - The strip number, `0..MAX_STRIPS`
    ///
    /// * `data` - The bytes to send, borrowed until the strip is ready again
    pub fn write_strip(&mut self, strip: usize, data: &'a [u8]) -> bool {
        if !self.is_strip_ready(strip) {
            return false;
        }

        let slot = &mut self.slots[strip];
        match slot.pins {
            Some(pins) if !data.is_empty() => {
                slot.mask = SET_AND_RESET << pins.data;
                slot.data = data;
                self.clock_mask |= 1 << pins.clock;
            }
            _ => slot.release(),
        }

        true
    }

    /// `port.is_strip_ready(s)` is true iff strip `s` is configured and has nothing pending.
    pub fn is_strip_ready(&self, strip: usize) -> bool {
        self.slots
            .get(strip)
            .map_or(false, |slot| slot.is_configured() && !slot.is_busy())
    }

    /// `port.pending(s)` is the number of bytes strip `s` still has to send.
    pub fn pending(&self, strip: usize) -> usize {
        self.slots.get(strip).map_or(0, |slot| slot.data.len())
    }

    /// `port.needs_updating()` is true iff any strip has data pending.
    pub fn needs_updating(&self) -> bool {
        self.clock_mask != 0
    }

    /// `port.update()` clocks one byte out of every strip with data pending, true iff any strip has more to send.
    ///
    /// Runs in constant time for a given set of configured strips. It must not be interrupted for long, the gaps
    /// between register writes are the bit timing seen by the strips.
    pub fn update(&mut self) -> bool {
        if !self.needs_updating() {
            return false;
        }

        if self.wide {
            self.write_strips8();
        } else {
            self.write_strips4();
        }

        for slot in self.slots.iter_mut() {
            if let Some((_, rest)) = slot.data.split_first() {
                slot.data = rest;
                if rest.is_empty() {
                    slot.release();
                }
            }
        }
        self.clock_mask = self.busy_clock_mask();

        self.needs_updating()
    }

    /// `port.finish()` waits for every strip to drain, then hands back the port free of any borrowed buffers.
    pub fn finish<'b>(mut self) -> StripPort<'b, R> {
        while self.update() {}

        StripPort {
            regs: self.regs,
            slots: self.slots.map(|slot| Slot {
                pins: slot.pins,
                ..Slot::EMPTY
            }),
            clock_mask: 0,
            wide: self.wide,
        }
    }

    /// `port.registers()` is the register bank driven by this port.
    #[cfg(test)]
    fn registers(&self) -> &R {
        &self.regs
    }

    fn busy_clock_mask(&self) -> u32 {
        self.slots.iter().fold(0, |mask, slot| mask | slot.clock_bit())
    }

    /// Sends one byte on strips 0..3, one write per strip per bit with the rotation fixed per write.
    fn write_strips4(&mut self) {
        let [m0, m1, m2, m3] = [
            self.slots[0].mask,
            self.slots[1].mask,
            self.slots[2].mask,
            self.slots[3].mask,
        ];
        let [p0, p1, p2, p3] = [
            self.slots[0].pattern(),
            self.slots[1].pattern(),
            self.slots[2].pattern(),
            self.slots[3].pattern(),
        ];
        let clock = self.clock_mask;
        let regs = &mut self.regs;

        macro_rules! clock_out {
            ($rotate:literal) => {
                regs.set_reset(p0.rotate_right($rotate) & m0);
                regs.set_reset(p1.rotate_right($rotate) & m1);
                regs.set_reset(p2.rotate_right($rotate) & m2);
                regs.set_reset(p3.rotate_right($rotate) & m3);
                regs.set_reset(clock);
                regs.reset(clock);
            };
        }

        regs.reset(clock);

        clock_out!(0);
        clock_out!(31);
        clock_out!(30);
        clock_out!(29);
        clock_out!(28);
        clock_out!(27);
        clock_out!(26);
        clock_out!(25);
    }

    /// Sends one byte on all strips, rotating every pattern one step per bit.
    fn write_strips8(&mut self) {
        let masks = self.slots.map(|slot| slot.mask);
        let mut patterns = self.slots.map(|slot| slot.pattern());
        let clock = self.clock_mask;
        let regs = &mut self.regs;

        regs.reset(clock);

        for _ in 0..8 {
            for (pattern, mask) in patterns.iter().zip(masks.iter()) {
                regs.set_reset(pattern & mask);
            }

            regs.set_reset(clock);

            for pattern in patterns.iter_mut() {
                *pattern = pattern.rotate_right(NEXT_BIT);
            }

            regs.reset(clock);
        }
    }
}
