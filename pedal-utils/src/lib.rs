//! Hardware independent building blocks for the Footsy MIDI foot controller.
//!
//! Nothing in here touches a peripheral directly. Samples are fed into the analog channels by the caller, and the
//! strip driver talks to its GPIO port through the [`gpio::GpioRegisters`] trait, so everything can be exercised
//! on the host.

#![cfg_attr(not(test), no_std)]

pub mod analog_channel;
pub mod apa102;
pub mod channel_config;
pub mod gpio;
pub mod strip_port;
