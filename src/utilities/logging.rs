//! Logging front-end. On target, every macro forwards to `defmt` (enabled
//! per level through the `defmt-*` features). On host builds the macros
//! only borrow their arguments, so tests run without a logger.

#[cfg(not(target_arch = "arm"))]
macro_rules! discard {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        $( let _ = &$arg; )*
    }};
}

macro_rules! debug {
    ($($tokens:tt)*) => {{
        #[cfg(target_arch = "arm")]
        defmt::debug!($($tokens)*);
        #[cfg(not(target_arch = "arm"))]
        $crate::utilities::logging::discard!($($tokens)*);
    }};
}

macro_rules! info {
    ($($tokens:tt)*) => {{
        #[cfg(target_arch = "arm")]
        defmt::info!($($tokens)*);
        #[cfg(not(target_arch = "arm"))]
        $crate::utilities::logging::discard!($($tokens)*);
    }};
}

macro_rules! warn_ {
    ($($tokens:tt)*) => {{
        #[cfg(target_arch = "arm")]
        defmt::warn!($($tokens)*);
        #[cfg(not(target_arch = "arm"))]
        $crate::utilities::logging::discard!($($tokens)*);
    }};
}

macro_rules! error {
    ($($tokens:tt)*) => {{
        #[cfg(target_arch = "arm")]
        defmt::error!($($tokens)*);
        #[cfg(not(target_arch = "arm"))]
        $crate::utilities::logging::discard!($($tokens)*);
    }};
}

#[cfg(not(target_arch = "arm"))]
pub(crate) use discard;
#[allow(unused_imports)]
pub(crate) use {debug, error, info, warn_ as warn};
