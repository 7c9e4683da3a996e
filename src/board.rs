use nb::block;
use stm32f1xx_hal::{
    adc::Adc,
    gpio::{
        gpioa::{PA0, PA1, PA2, PA3},
        gpiob::PB3,
        Analog, Input, PullUp,
    },
    pac::{self, ADC1},
    prelude::*,
    timer::{SysCounterHz, Timer},
};

use crate::led_port::LedPort;

/// The rate of the control loop tick, every input is sampled and one LED byte is sent per tick.
pub const TICK_RATE_HZ: u32 = 1_000;

/// LED strip data line, PB9
pub const LED_DATA_PIN: u8 = 9;

/// LED strip clock line, PB8
pub const LED_CLOCK_PIN: u8 = 8;

/// The jacks for expression pedals and other external analog controls.
#[derive(Clone, Copy)]
pub enum ExtInput {
    Ext1,
    Ext2,
    Ext3,
    Ext4,
}

impl ExtInput {
    pub const ALL: [ExtInput; 4] = [
        ExtInput::Ext1,
        ExtInput::Ext2,
        ExtInput::Ext3,
        ExtInput::Ext4,
    ];
}

/// The physical board hardware structure is represented here.
pub struct Board {
    /// The analog to digital converter
    adc: Adc<ADC1>,

    /// External control jacks, read via the ADC
    ext_1: PA0<Analog>,
    ext_2: PA1<Analog>,
    ext_3: PA2<Analog>,
    ext_4: PA3<Analog>,

    /// Foot switch 1, held at power-up to calibrate the external controls
    calibrate_switch: PB3<Input<PullUp>>,

    /// SysTick counter pacing the control loop
    tick: SysCounterHz,
}

impl Board {
    /// `Board::init()` is the board with all peripherals initialized, along with the GPIO port driving the LEDs.
    pub fn init() -> (Self, LedPort) {
        let cp = cortex_m::Peripherals::take().unwrap();
        let dp = pac::Peripherals::take().unwrap();

        let mut flash = dp.FLASH.constrain();
        let rcc = dp.RCC.constrain();
        let clocks = rcc
            .cfgr
            .use_hse(8.MHz())
            .sysclk(72.MHz())
            .pclk1(36.MHz())
            .freeze(&mut flash.acr);

        let mut afio = dp.AFIO.constrain();
        let mut gpioa = dp.GPIOA.split();
        let mut gpiob = dp.GPIOB.split();

        // PB3 comes out of reset as the JTAG TDO pin
        let (_pa15, pb3, _pb4) = afio.mapr.disable_jtag(gpioa.pa15, gpiob.pb3, gpiob.pb4);
        let calibrate_switch = pb3.into_pull_up_input(&mut gpiob.crl);

        let adc = Adc::adc1(dp.ADC1, clocks);
        let ext_1 = gpioa.pa0.into_analog(&mut gpioa.crl);
        let ext_2 = gpioa.pa1.into_analog(&mut gpioa.crl);
        let ext_3 = gpioa.pa2.into_analog(&mut gpioa.crl);
        let ext_4 = gpioa.pa3.into_analog(&mut gpioa.crl);

        let mut tick = Timer::syst(cp.SYST, &clocks).counter_hz();
        tick.start(TICK_RATE_HZ.Hz()).unwrap();

        // the GPIOB clock was enabled by `split()` above, PB8 and PB9 are left alone by the HAL from here on
        let led_port = unsafe { LedPort::steal() };

        (
            Self {
                adc,
                ext_1,
                ext_2,
                ext_3,
                ext_4,
                calibrate_switch,
                tick,
            },
            led_port,
        )
    }

    /// `board.read_ext(i)` is the current raw ADC reading of external control jack `i`.
    pub fn read_ext(&mut self, input: ExtInput) -> u16 {
        let sample: nb::Result<u16, ()> = match input {
            ExtInput::Ext1 => self.adc.read(&mut self.ext_1),
            ExtInput::Ext2 => self.adc.read(&mut self.ext_2),
            ExtInput::Ext3 => self.adc.read(&mut self.ext_3),
            ExtInput::Ext4 => self.adc.read(&mut self.ext_4),
        };
        sample.unwrap_or(0)
    }

    /// `board.calibrate_switch_held()` is true iff foot switch 1 is pressed.
    pub fn calibrate_switch_held(&self) -> bool {
        self.calibrate_switch.is_low()
    }

    /// `board.wait_for_tick()` blocks until the start of the next control loop tick.
    pub fn wait_for_tick(&mut self) {
        block!(self.tick.wait()).ok();
    }

    /// `board.delay_ms(ms)` blocks for `ms` milliseconds, rounded to whole ticks.
    pub fn delay_ms(&mut self, ms: u32) {
        for _ in 0..(ms * TICK_RATE_HZ / 1_000) {
            self.wait_for_tick();
        }
    }
}
