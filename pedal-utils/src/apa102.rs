//! APA102 frame encoding.
//!
//! A frame is a start frame of four zero bytes, one 4 byte LED frame per LED (`0b111` header plus 5 bit global
//! brightness, then blue, green, red), and an end frame of `0xFF` bytes which supplies the extra clock edges the
//! strip needs to push the last LED's data through.

use smart_leds::RGB8;

/// Largest value of the 5 bit brightness field.
pub const MAX_BRIGHTNESS: u8 = 0x1F;

const START_FRAME_LEN: usize = 4;
const LED_FRAME_LEN: usize = 4;
const LED_FRAME_HEADER: u8 = 0b1110_0000;
const END_FRAME_BYTE: u8 = 0xFF;

/// `end_frame_len(n)` is the number of end frame bytes needed by a strip of `n` LEDs.
///
/// The strip needs half a clock edge per LED, never send less than a word though.
pub const fn end_frame_len(num_leds: usize) -> usize {
    let needed = (num_leds + 15) / 16;
    if needed < 4 {
        4
    } else {
        needed
    }
}

/// `frame_len(n)` is the size of the whole frame for a strip of `n` LEDs.
pub const fn frame_len(num_leds: usize) -> usize {
    START_FRAME_LEN + LED_FRAME_LEN * num_leds + end_frame_len(num_leds)
}

/// `encode_frame(c, b, out)` writes the frame for colours `c` at brightness `b` into `out`.
///
/// Returns the length of the frame, or `None` if `out` can't hold it.
///
/// # Arguments:
///
/// * `colors` - One colour per LED, nearest LED first
///
/// * `brightness` - Global brightness, clamped to `MAX_BRIGHTNESS`
///
/// * `out` - Where the frame is written
pub fn encode_frame(colors: &[RGB8], brightness: u8, out: &mut [u8]) -> Option<usize> {
    let len = frame_len(colors.len());
    let out = out.get_mut(..len)?;

    let (start, rest) = out.split_at_mut(START_FRAME_LEN);
    let (leds, end) = rest.split_at_mut(LED_FRAME_LEN * colors.len());

    start.fill(0);

    let header = LED_FRAME_HEADER | brightness.min(MAX_BRIGHTNESS);
    for (led, color) in leds.chunks_exact_mut(LED_FRAME_LEN).zip(colors) {
        led.copy_from_slice(&[header, color.b, color.g, color.r]);
    }

    end.fill(END_FRAME_BYTE);

    Some(len)
}

/// `level(v, m)` is `v` out of `m` as a `smart_leds::brightness` level, `v` is clamped to `m`.
pub fn level(value: u16, max: u16) -> u8 {
    if max == 0 {
        return 0;
    }
    let value = u32::from(value.min(max));
    (value * u32::from(u8::MAX) / u32::from(max)) as u8
}

#[cfg(test)]
mod tests {
    use core::iter::once;

    use smart_leds::brightness;

    use super::*;

    #[test]
    fn frame_sizes() {
        assert_eq!(end_frame_len(8), 4);
        assert_eq!(end_frame_len(100), 7);
        assert_eq!(frame_len(8), 4 + 32 + 4);
    }

    #[test]
    fn leds_are_sent_blue_green_red() {
        let colors = [RGB8 { r: 1, g: 2, b: 3 }, RGB8 { r: 4, g: 5, b: 6 }];
        let mut out = [0xAA; 32];

        assert_eq!(encode_frame(&colors, 7, &mut out), Some(16));
        assert_eq!(
            out[..16],
            [0, 0, 0, 0, 0xE7, 3, 2, 1, 0xE7, 6, 5, 4, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        // nothing past the frame is touched
        assert_eq!(out[16], 0xAA);
    }

    #[test]
    fn brightness_is_clamped_to_five_bits() {
        let mut out = [0; frame_len(1)];

        encode_frame(&[RGB8::default()], 0xFF, &mut out);
        assert_eq!(out[4], 0xFF);
    }

    #[test]
    fn short_buffer_is_refused() {
        let mut out = [0; frame_len(2) - 1];

        assert_eq!(encode_frame(&[RGB8::default(); 2], 1, &mut out), None);
    }

    #[test]
    fn levels_ramp_linearly() {
        assert_eq!(level(127, 127), u8::MAX);
        assert_eq!(level(0, 127), 0);
        assert_eq!(level(64, 128), 127);
        assert_eq!(level(500, 127), u8::MAX);
        assert_eq!(level(10, 0), 0);
    }

    #[test]
    fn dimmed_colour_follows_the_level() {
        let color = RGB8 { r: 200, g: 100, b: 0 };
        let dim = |value, max| brightness(once(color), level(value, max)).next();

        assert_eq!(dim(127, 127), Some(color));
        assert_eq!(dim(0, 127), Some(RGB8::default()));
        assert_eq!(dim(64, 128), Some(RGB8 { r: 100, g: 50, b: 0 }));
    }
}
