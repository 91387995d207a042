//! Feature-gated logging.
//!
//! The crate never installs a logger. Enable `log`, `defmt` or `esp32-log` to
//! route diagnostics to the matching backend; with none enabled the macros
//! compile to nothing.

macro_rules! rpc_log {
    ($level:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "log")]
        ::log::$level!($fmt $(, $arg)*);
        #[cfg(feature = "defmt")]
        ::defmt::$level!($fmt $(, $arg)*);
        #[cfg(feature = "esp32-log")]
        ::esp_println::println!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "log", feature = "defmt", feature = "esp32-log")))]
        {
            let _ = ($(&$arg,)*);
        }
    }};
}

macro_rules! rpc_debug {
    ($($tt:tt)*) => {
        $crate::logging::rpc_log!(debug, $($tt)*)
    };
}

macro_rules! rpc_warn {
    ($($tt:tt)*) => {
        $crate::logging::rpc_log!(warn, $($tt)*)
    };
}

pub(crate) use {rpc_debug, rpc_log, rpc_warn};
