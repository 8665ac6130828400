//! Crate-internal logging macros.
//!
//! With the `tracing` feature they forward to `tracing`; without it the
//! arguments are only type-checked, so call sites must stick to plain format
//! strings (no `tracing` field syntax).
#![allow(unused_macros)]

macro_rules! trace {
    ($($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        tracing::trace!($($arg)+);
        #[cfg(not(feature = "tracing"))]
        let _ = format_args!($($arg)+);
    }};
}

macro_rules! debug {
    ($($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        tracing::debug!($($arg)+);
        #[cfg(not(feature = "tracing"))]
        let _ = format_args!($($arg)+);
    }};
}

macro_rules! info {
    ($($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        tracing::info!($($arg)+);
        #[cfg(not(feature = "tracing"))]
        let _ = format_args!($($arg)+);
    }};
}

macro_rules! warn {
    ($($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        tracing::warn!($($arg)+);
        #[cfg(not(feature = "tracing"))]
        let _ = format_args!($($arg)+);
    }};
}

macro_rules! error {
    ($($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        tracing::error!($($arg)+);
        #[cfg(not(feature = "tracing"))]
        let _ = format_args!($($arg)+);
    }};
}
