/// `log!(fmt, args..)` prints over semihosting when the `semihosting` feature is on, and compiles to nothing otherwise.
macro_rules! log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "semihosting")]
        cortex_m_semihosting::hprintln!($($arg)*);
        #[cfg(not(feature = "semihosting"))]
        let _ = format_args!($($arg)*);
    }};
}
