//! Full project ports for specific targets. They provide the
//! register level drivers behind the `hal` interfaces, and a
//! method to construct a generic loader from them.

#[cfg(all(target_arch = "arm", not(feature = "cortex_m_any")))]
compile_error!("Building for ARM requires a port feature, such as `stm32f429`");

#[cfg(all(target_arch = "arm", feature = "stm32f429"))]
port!(stm32f429: [button, clock, flash, loader, otp, rng, system,]);
