// cargo flash -p midi-pedal --chip stm32f103c8 --release --target thumbv7m-none-eabi

#![no_std]
#![no_main]

#[macro_use]
mod macros;

mod app;
mod board;
mod led_port;
mod mode_switch;

use crate::app::App;
use crate::board::Board;
use crate::led_port::LedPort;
use crate::mode_switch::Mode;

use pedal_utils::strip_port::StripPort;

use panic_halt as _;

use cortex_m_rt::entry;

/// The LED chain is a single strip on the LED port.
const LED_STRIP: usize = 0;

/// Run the foot controller.
///
/// Every tick samples the external controls and clocks one byte out to the LEDs. A fresh LED frame is rendered each
/// time the previous one has been sent.
#[entry]
fn main() -> ! {
    let (mut board, led_port) = Board::init();

    // small delay to allow the pedal inputs to settle before taking the first readings
    board.delay_ms(100);

    let mut app = App::new(&mut board);

    let mut leds = StripPort::new(led_port);
    leds.configure_strip(LED_STRIP, board::LED_DATA_PIN, board::LED_CLOCK_PIN);

    log!("footsy up");

    if mode_switch::read(&board) == Mode::Calibrate {
        app.start_calibration();
    }

    let mut frame = [0; app::FRAME_LEN];

    loop {
        let len = app.render(&mut frame);

        let mut strips: StripPort<'_, LedPort> = leds;
        strips.write_strip(LED_STRIP, &frame[..len]);

        while strips.needs_updating() {
            board.wait_for_tick();

            app.poll(&mut board);
            strips.update();

            if app.is_calibrating() && mode_switch::read(&board) == Mode::Play {
                app.end_calibration();
            }
        }

        leds = strips.finish();
    }
}
