//! Convenience macros for the loader.
#![macro_use]

/// Declares a port module and its submodules, and pulls the submodules
/// into the current namespace.
///
/// Used to fit the whole declaration under a single configuration flag.
///
/// # Example
/// ```ignore
/// #[cfg(feature = "stm32f429")]
/// port!(stm32f429: [flash, rng,]);
/// // Expands into:
/// pub mod stm32f429 { pub mod flash; pub mod rng; }
/// pub use self::stm32f429::flash;
/// pub use self::stm32f429::rng;
/// ```
#[macro_export]
macro_rules! port {
    ($outer:ident: [$($inner:ident,)+]) => {
        pub mod $outer {
        $(
            pub mod $inner;
        )+
        }
        $(
            pub use self::$outer::$inner;
        )+
    };
}
