use core::iter::once;

use pedal_utils::{
    analog_channel::{AnalogChannel, ADC_MAX, DEFAULT_MAX_VALUE},
    apa102,
};
use smart_leds::{brightness, RGB8};

use crate::board::{Board, ExtInput};

pub const NUM_EXT_CONTROLS: usize = 4;

/// Status LED, one LED per external control, then the foot switch LEDs 3, 2, 1.
pub const NUM_LEDS: usize = 8;

/// The size of one APA102 frame for the whole LED chain.
pub const FRAME_LEN: usize = apa102::frame_len(NUM_LEDS);

const STATUS_LED: usize = 0;
const EXT_LEDS: [usize; NUM_EXT_CONTROLS] = [1, 2, 3, 4];

const CALIBRATING_COLOR: RGB8 = RGB8 {
    r: 127,
    g: 0,
    b: 255,
};
const READY_COLOR: RGB8 = RGB8 {
    r: 95,
    g: 95,
    b: 95,
};
const EXT_COLOR: RGB8 = RGB8 { r: 0, g: 127, b: 0 };

/// Global APA102 brightness, out of 31. The LEDs sit right next to the player's feet.
const BRIGHTNESS: u8 = 8;

/// All of the pedal's application state is represented here.
///
/// Built once at startup and owned by the main loop.
pub struct App {
    ext_controls: [AnalogChannel; NUM_EXT_CONTROLS],
    leds: [RGB8; NUM_LEDS],
}

impl App {
    /// `App::new(board)` is the application with every external control seeded from its current reading.
    pub fn new(board: &mut Board) -> Self {
        Self {
            ext_controls: ExtInput::ALL
                .map(|input| AnalogChannel::new(board.read_ext(input), DEFAULT_MAX_VALUE)),
            leds: [RGB8::default(); NUM_LEDS],
        }
    }

    /// `app.poll(board)` samples every external control once, true iff any control value changed.
    pub fn poll(&mut self, board: &mut Board) -> bool {
        let mut changed = false;
        for (channel, &input) in self.ext_controls.iter_mut().zip(ExtInput::ALL.iter()) {
            changed |= channel.update(board.read_ext(input));
        }
        changed
    }

    pub fn is_calibrating(&self) -> bool {
        self.ext_controls.iter().any(AnalogChannel::is_calibrating)
    }

    pub fn start_calibration(&mut self) {
        log!("calibrating external controls");
        for channel in self.ext_controls.iter_mut() {
            channel.start_calibration();
        }
    }

    pub fn end_calibration(&mut self) {
        for (i, channel) in self.ext_controls.iter_mut().enumerate() {
            channel.end_calibration();
            log!(
                "ext {}: {}..{} hysteresis {}",
                i + 1,
                channel.raw_min(),
                channel.raw_max(),
                channel.hysteresis()
            );
        }
    }

    /// `app.render(frame)` writes the APA102 frame for the current state into `frame`, returns its length.
    ///
    /// While calibrating, each control's LED follows its raw reading so the player can see the travel being learned.
    pub fn render(&mut self, frame: &mut [u8]) -> usize {
        self.leds[STATUS_LED] = if self.is_calibrating() {
            CALIBRATING_COLOR
        } else {
            READY_COLOR
        };

        for (&led, channel) in EXT_LEDS.iter().zip(self.ext_controls.iter()) {
            let level = if channel.is_calibrating() {
                apa102::level(channel.raw_average(), ADC_MAX)
            } else {
                apa102::level(channel.value(), channel.max_value())
            };
            self.leds[led] = brightness(once(EXT_COLOR), level)
                .next()
                .unwrap_or_default();
        }

        apa102::encode_frame(&self.leds, BRIGHTNESS, frame).unwrap_or(0)
    }
}
