//! # Calibrated analog input channel
//!
//! Expression pedals, volume pedals and the other auxiliary inputs of the foot controller are read by the ADC as
//! noisy integers. A channel turns that stream of raw samples into a stable value in `[0, max_value]`, suitable for
//! handing to the MIDI mapping layer.
//!
//! Each update goes through three steps:
//!
//! * the new sample is averaged with the three before it
//!
//! * the average is compared against a Schmitt style dead-band centered on the last committed reading. Anything
//! inside the band is ignored, so sensor noise never reaches the output
//!
//! * readings outside the band are clamped into the calibrated range and normalized, either linearly or with an
//! inverse taper that undoes the log taper of a passive volume pedal
//!
//! The band follows the signal with its narrow half when the input keeps moving in the same direction, and with its
//! full width after a reversal, so the output doesn't dither at turning points.
//!
//! The channel has no connection to the hardware, samples are fed in by the caller. All arithmetic is integer.

use core::cmp::Ordering;

use heapless::HistoryBuffer;

use crate::channel_config::ChannelConfig;

/// The maximum value that can be produced by the 12 bit Analog to Digital Converter.
pub const ADC_MAX: u16 = (1 << 12) - 1;

/// The usual output range for a channel, a MIDI controller value.
pub const DEFAULT_MAX_VALUE: u16 = 127;

/// The number of samples in the moving average.
const NUM_SAMPLES: usize = 4;

/// Lower limit for half of the hysteresis band, in raw ADC counts.
///
/// Derived empirically from the noise floor of the pedal inputs.
const MIN_HALF_HYSTERESIS: u32 = 16;

/// A calibrated, noise rejecting analog input is represented here.
pub struct AnalogChannel {
    /// The most recent raw samples, oldest overwritten first
    samples: HistoryBuffer<u16, NUM_SAMPLES>,

    /// Mean of `samples`
    average: u16,

    /// Calibrated lower bound, or the smallest average seen while calibrating
    raw_min: u16,

    /// Calibrated upper bound, or the largest average seen while calibrating
    raw_max: u16,

    /// The bounds in force when the current calibration window opened
    restore_min: u16,
    restore_max: u16,

    /// Upper end of the output range
    max_value: u16,

    /// Report `max_value - value` instead of `value`
    invert: bool,

    /// Linear response when true, inverse taper when false
    active: bool,

    /// Full width of the hysteresis band
    hysteresis: u16,

    /// Half width of the hysteresis band, rounded down
    half_hysteresis: u16,

    /// Open band around the last committed reading, `None` until something is committed
    band: Option<Band>,

    /// Last committed (non-inverted) output, `None` until something is committed
    value: Option<u16>,

    /// True while a calibration window is open
    calibrating: bool,
}

impl AnalogChannel {
    /// `AnalogChannel::new(s, m)` is a new channel seeded with the first sample `s`, producing values in `[0, m]`.
    ///
    /// The channel starts out calibrated to the full ADC range with a linear, non-inverted response.
    ///
    /// # Arguments:
    ///
    /// * `first_sample` - The first raw reading of the input, used to fill the averaging history
    ///
    /// * `max_value` - The largest value the channel will produce
    pub fn new(first_sample: u16, max_value: u16) -> Self {
        let first_sample = first_sample.min(ADC_MAX);

        let mut channel = Self {
            samples: HistoryBuffer::new_with(first_sample),
            average: first_sample,
            raw_min: 0,
            raw_max: ADC_MAX,
            restore_min: 0,
            restore_max: ADC_MAX,
            max_value,
            invert: false,
            active: true,
            hysteresis: 0,
            half_hysteresis: 0,
            band: None,
            value: None,
            calibrating: false,
        };
        channel.end_calibration();
        channel
    }

    /// `ch.configure(lo, hi, inv, act)` commits new calibration bounds and response flags.
    ///
    /// The hysteresis band is recomputed from the new span and the current average is re-evaluated right away, so
    /// `value()` is consistent with the new settings as soon as this returns. Bounds given in the wrong order are
    /// swapped, bounds above `ADC_MAX` are clamped.
    ///
    /// # Arguments:
    ///
    /// * `raw_min` - The raw reading that maps to 0
    ///
    /// * `raw_max` - The raw reading that maps to `max_value`
    ///
    /// * `invert` - Flip the output so that `raw_min` maps to `max_value`
    ///
    /// * `active` - Use the linear response, otherwise use the inverse taper for passive volume pedals
    pub fn configure(&mut self, raw_min: u16, raw_max: u16, invert: bool, active: bool) {
        let raw_min = raw_min.min(ADC_MAX);
        let raw_max = raw_max.min(ADC_MAX);

        self.calibrating = false;
        self.raw_min = raw_min.min(raw_max);
        self.raw_max = raw_min.max(raw_max);
        self.invert = invert;
        self.active = active;

        let span = u32::from(self.raw_max - self.raw_min) + 1;
        let counts_per_step = span / (u32::from(self.max_value) + 1);
        // span is at most 4096 so this always fits
        self.hysteresis = (2 * counts_per_step.max(MIN_HALF_HYSTERESIS)) as u16;
        self.half_hysteresis = self.hysteresis / 2;

        self.band = None;
        self.value = None;
        self.evaluate();
    }

    /// `ch.apply(cfg)` configures the channel from a stored configuration record.
    pub fn apply(&mut self, config: &ChannelConfig) {
        self.configure(config.raw_min, config.raw_max, config.invert, config.active);
    }

    /// `ch.config()` is the channel's current calibration and response as a storable record.
    pub fn config(&self) -> ChannelConfig {
        ChannelConfig {
            raw_min: self.raw_min,
            raw_max: self.raw_max,
            invert: self.invert,
            active: self.active,
        }
    }

    /// `ch.start_calibration()` opens a calibration window.
    ///
    /// Until `end_calibration()` is called, updates only widen the bounds to cover every average seen and never
    /// report a change.
    pub fn start_calibration(&mut self) {
        if !self.calibrating {
            self.restore_min = self.raw_min;
            self.restore_max = self.raw_max;
        }
        self.raw_min = ADC_MAX;
        self.raw_max = 0;
        self.calibrating = true;
    }

    /// `ch.end_calibration()` closes the calibration window and configures the channel with the learned bounds.
    ///
    /// If no samples arrived during the window the bounds that were in force before it are kept.
    pub fn end_calibration(&mut self) {
        if self.raw_min > self.raw_max {
            self.raw_min = self.restore_min;
            self.raw_max = self.restore_max;
        }
        self.configure(self.raw_min, self.raw_max, self.invert, self.active);
    }

    /// `ch.update(s)` feeds the raw sample `s` into the channel, true iff the output value changed.
    ///
    /// Must be called once per control loop tick.
    ///
    /// # Arguments:
    ///
    /// * `raw` - The newest raw ADC reading for this input
    pub fn update(&mut self, raw: u16) -> bool {
        self.samples.write(raw.min(ADC_MAX));
        self.average = mean(self.samples.as_slice());

        if self.calibrating {
            self.raw_min = self.raw_min.min(self.average);
            self.raw_max = self.raw_max.max(self.average);
            return false;
        }

        self.evaluate()
    }

    /// `ch.value()` is the current output in `[0, max_value]`, with inversion applied.
    pub fn value(&self) -> u16 {
        let value = self.value.unwrap_or(0);
        if self.invert {
            self.max_value - value
        } else {
            value
        }
    }

    /// `ch.raw()` is the most recent raw sample.
    pub fn raw(&self) -> u16 {
        self.samples.recent().copied().unwrap_or(self.average)
    }

    /// `ch.raw_average()` is the mean of the last four raw samples.
    pub fn raw_average(&self) -> u16 {
        self.average
    }

    pub fn raw_min(&self) -> u16 {
        self.raw_min
    }

    pub fn raw_max(&self) -> u16 {
        self.raw_max
    }

    /// `ch.hysteresis()` is the full width of the dead-band, in raw ADC counts.
    pub fn hysteresis(&self) -> u16 {
        self.hysteresis
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn max_value(&self) -> u16 {
        self.max_value
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// `ch.evaluate()` runs the current average through the dead-band and normalization, true iff the value changed
    fn evaluate(&mut self) -> bool {
        if let Some(band) = self.band {
            if band.contains(self.average) {
                return false;
            }
        }

        let clamped = self.average.clamp(self.raw_min, self.raw_max);
        let value = self.normalize(clamped);
        self.commit(value, clamped)
    }

    /// `ch.normalize(r)` is the clamped raw reading `r` scaled to `[0, max_value]`
    fn normalize(&self, clamped: u16) -> u16 {
        let span = u64::from(self.raw_max - self.raw_min);
        if span == 0 {
            return 0;
        }

        let offset = u64::from(clamped - self.raw_min);
        let max_value = u64::from(self.max_value);

        let value = if self.active {
            offset * max_value / span
        } else {
            let headroom = u64::from(ADC_MAX - clamped);
            if headroom == 0 {
                // the pedal is pinned against the top of the converter range
                max_value
            } else {
                offset * u64::from(ADC_MAX - self.raw_max) * max_value / span / headroom
            }
        };

        value.min(max_value) as u16
    }

    /// `ch.commit(v, r)` stores `v` as the new output and re-centers the band on raw reading `r`
    fn commit(&mut self, value: u16, reference: u16) -> bool {
        if self.value == Some(value) {
            return false;
        }

        let direction = match self.value {
            Some(previous) => value.cmp(&previous),
            None => Ordering::Equal,
        };

        self.band = Some(Band::around(
            reference,
            direction,
            self.hysteresis,
            self.half_hysteresis,
        ));
        self.value = Some(value);
        true
    }
}

/// An open interval of raw readings which are treated as "no change".
#[derive(Clone, Copy)]
struct Band {
    lower: i32,
    upper: i32,
}

impl Band {
    /// `Band::around(r, d, w, h)` is the band around reference reading `r` after a step in direction `d`.
    ///
    /// The side the signal was moving towards gets the half width `h`, the other side gets the full width `w`.
    fn around(reference: u16, direction: Ordering, full: u16, half: u16) -> Self {
        let reference = i32::from(reference);
        let below = if direction == Ordering::Less { half } else { full };
        let above = if direction == Ordering::Greater { half } else { full };

        Self {
            lower: reference - i32::from(below),
            upper: reference + i32::from(above),
        }
    }

    fn contains(&self, raw: u16) -> bool {
        let raw = i32::from(raw);
        self.lower < raw && raw < self.upper
    }
}

/// `mean(s)` is the integer mean of the samples `s`
fn mean(samples: &[u16]) -> u16 {
    if samples.is_empty() {
        return 0;
    }
    let sum: u32 = samples.iter().map(|&s| u32::from(s)).sum();
    (sum / samples.len() as u32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `feed(ch, raw)` fills the whole averaging window with `raw`, true iff any of the updates reported a change
    fn feed(channel: &mut AnalogChannel, raw: u16) -> bool {
        let mut changed = false;
        for _ in 0..NUM_SAMPLES {
            changed |= channel.update(raw);
        }
        changed
    }

    fn full_range_channel(invert: bool, active: bool) -> AnalogChannel {
        let mut channel = AnalogChannel::new(0, DEFAULT_MAX_VALUE);
        channel.configure(0, ADC_MAX, invert, active);
        channel
    }

    #[test]
    fn new_channel_is_calibrated_to_full_range() {
        let channel = AnalogChannel::new(1234, DEFAULT_MAX_VALUE);

        assert_eq!(channel.raw_min(), 0);
        assert_eq!(channel.raw_max(), ADC_MAX);
        assert_eq!(channel.raw(), 1234);
        assert_eq!(channel.raw_average(), 1234);
        assert!(!channel.is_calibrating());
        assert_eq!(channel.value(), 38);
    }

    #[test]
    fn full_range_linear_scales_to_midi_range() {
        let mut channel = full_range_channel(false, true);

        feed(&mut channel, 2048);
        assert_eq!(channel.value(), 63);

        feed(&mut channel, ADC_MAX);
        assert_eq!(channel.value(), 127);
    }

    #[test]
    fn inverted_channel_reads_zero_at_the_top() {
        let mut channel = full_range_channel(true, true);

        feed(&mut channel, ADC_MAX);
        assert_eq!(channel.value(), 0);
    }

    #[test]
    fn inversion_mirrors_the_plain_value() {
        for &active in &[true, false] {
            let mut plain = full_range_channel(false, active);
            let mut inverted = full_range_channel(true, active);

            for raw in (0..=ADC_MAX).step_by(97) {
                plain.update(raw);
                inverted.update(raw);
                assert_eq!(inverted.value(), DEFAULT_MAX_VALUE - plain.value());
            }
        }
    }

    #[test]
    fn average_covers_last_four_samples() {
        let mut channel = AnalogChannel::new(0, DEFAULT_MAX_VALUE);

        channel.update(400);
        assert_eq!(channel.raw(), 400);
        assert_eq!(channel.raw_average(), 100);

        channel.update(400);
        channel.update(400);
        channel.update(800);
        assert_eq!(channel.raw_average(), 500);
    }

    #[test]
    fn hysteresis_width_follows_span_and_resolution() {
        let mut channel = AnalogChannel::new(0, DEFAULT_MAX_VALUE);

        // 4096 counts over 128 steps, 32 counts per step
        channel.configure(0, ADC_MAX, false, true);
        assert_eq!(channel.hysteresis(), 64);

        // a narrow span bottoms out at the minimum
        channel.configure(1000, 1500, false, true);
        assert_eq!(channel.hysteresis(), 32);
    }

    #[test]
    fn readings_inside_the_band_are_ignored() {
        let mut channel = full_range_channel(false, true);
        assert!(feed(&mut channel, 2048));
        let committed = channel.value();

        for raw in [2070, 2000, 2060, 1990, 2048] {
            for _ in 0..NUM_SAMPLES {
                assert!(!channel.update(raw));
                assert_eq!(channel.value(), committed);
            }
        }
    }

    #[test]
    fn moving_on_in_the_same_direction_uses_the_half_band() {
        let mut channel = full_range_channel(false, true);
        feed(&mut channel, 2048);

        // the last step was upwards, so 32 counts above the reference is enough to move again
        assert!(feed(&mut channel, 2090));
        assert_eq!(channel.value(), 64);
    }

    #[test]
    fn reversing_direction_needs_the_full_band() {
        let mut channel = full_range_channel(false, true);
        feed(&mut channel, 2048);

        // 58 counts below is outside the half band but inside the full one
        assert!(!feed(&mut channel, 1990));
        assert_eq!(channel.value(), 63);

        assert!(feed(&mut channel, 1900));
        assert!(channel.value() < 63);
    }

    #[test]
    fn output_stays_in_range_for_any_input() {
        for &active in &[true, false] {
            let mut channel = AnalogChannel::new(0, DEFAULT_MAX_VALUE);
            channel.configure(500, 3500, false, active);

            for raw in (0..=u16::MAX).step_by(13) {
                channel.update(raw);
                assert!(channel.value() <= DEFAULT_MAX_VALUE);
            }
        }
    }

    #[test]
    fn out_of_range_readings_saturate() {
        let mut channel = AnalogChannel::new(0, DEFAULT_MAX_VALUE);
        channel.configure(1000, 3000, false, true);

        feed(&mut channel, 100);
        assert_eq!(channel.value(), 0);

        feed(&mut channel, 4000);
        assert_eq!(channel.value(), 127);
    }

    #[test]
    fn passive_taper_bends_the_middle_of_travel() {
        let mut passive = AnalogChannel::new(0, DEFAULT_MAX_VALUE);
        passive.configure(0, 3500, false, false);
        let mut linear = AnalogChannel::new(0, DEFAULT_MAX_VALUE);
        linear.configure(0, 3500, false, true);

        feed(&mut passive, 1750);
        feed(&mut linear, 1750);
        assert_eq!(passive.value(), 16);
        assert_eq!(linear.value(), 63);

        feed(&mut passive, 3500);
        assert_eq!(passive.value(), 127);
    }

    #[test]
    fn passive_taper_at_converter_maximum_reads_full_scale() {
        let mut channel = full_range_channel(false, false);

        feed(&mut channel, ADC_MAX);
        assert_eq!(channel.value(), 127);
    }

    #[test]
    fn collapsed_span_reads_zero() {
        let mut channel = AnalogChannel::new(0, DEFAULT_MAX_VALUE);
        channel.configure(1000, 1000, false, false);

        for raw in [0, 999, 1000, 1001, ADC_MAX] {
            feed(&mut channel, raw);
            assert_eq!(channel.value(), 0);
        }
    }

    #[test]
    fn swapped_bounds_are_reordered() {
        let mut channel = AnalogChannel::new(0, DEFAULT_MAX_VALUE);
        channel.configure(3000, 100, false, true);

        assert_eq!(channel.raw_min(), 100);
        assert_eq!(channel.raw_max(), 3000);
    }

    #[test]
    fn calibration_learns_the_observed_extremes() {
        let mut channel = AnalogChannel::new(100, DEFAULT_MAX_VALUE);
        channel.start_calibration();
        assert!(channel.is_calibrating());

        assert!(!feed(&mut channel, 100));
        for raw in (100..=3000).step_by(100) {
            assert!(!channel.update(raw));
        }
        assert!(!feed(&mut channel, 3000));

        channel.end_calibration();

        assert!(!channel.is_calibrating());
        assert_eq!(channel.raw_min(), 100);
        assert_eq!(channel.raw_max(), 3000);
        // 2901 counts over 128 steps
        assert_eq!(channel.hysteresis(), 44);
        assert_eq!(channel.value(), 127);
    }

    #[test]
    fn calibration_never_reports_changes() {
        let mut channel = full_range_channel(false, true);
        let before = channel.value();
        channel.start_calibration();

        for raw in [0, ADC_MAX, 0, ADC_MAX, 2048] {
            assert!(!feed(&mut channel, raw));
            assert_eq!(channel.value(), before);
        }
        assert!(channel.raw_min() <= channel.raw_max());
    }

    #[test]
    fn empty_calibration_window_keeps_previous_bounds() {
        let mut channel = AnalogChannel::new(0, DEFAULT_MAX_VALUE);
        channel.configure(200, 3000, true, false);

        channel.start_calibration();
        channel.end_calibration();

        assert_eq!(channel.raw_min(), 200);
        assert_eq!(channel.raw_max(), 3000);
        assert!(channel.invert());
        assert!(!channel.active());
    }

    #[test]
    fn stored_config_restores_behaviour() {
        let mut source = AnalogChannel::new(0, DEFAULT_MAX_VALUE);
        source.configure(300, 2800, true, false);

        let mut restored = AnalogChannel::new(0, DEFAULT_MAX_VALUE);
        restored.apply(&source.config());

        assert_eq!(restored.config(), source.config());
        feed(&mut source, 2000);
        feed(&mut restored, 2000);
        assert_eq!(restored.value(), source.value());
    }
}
