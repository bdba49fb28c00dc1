//! Hardware random number generator, with the continuous test of FIPS
//! PUB 140-2 applied on top of the peripheral's own health checks.
use crate::{
    error::{Convertible, Error as LoaderError},
    hal::rng,
    stm32pac::{RCC, RNG},
};

const AHB2ENR_RNGEN: u32 = 1 << 6;
const CR_RNGEN: u32 = 1 << 2;
const SR_DRDY: u32 = 1 << 0;
const SR_CEIS: u32 = 1 << 5;
const SR_SEIS: u32 = 1 << 6;

/// Seed errors tolerated before giving up on the generator.
const MAX_SEED_ERRORS: u8 = 3;

#[derive(Copy, Clone, Debug)]
pub enum Error {
    SeedError,
}

impl Convertible for Error {
    fn into_error(self) -> LoaderError {
        match self {
            Error::SeedError => LoaderError::DriverError("RNG seed error"),
        }
    }
}

pub struct HardwareRng {
    rng: RNG,
    /// Last word handed out, or drawn and discarded.
    previous: Option<u32>,
    seed_errors: u8,
}

impl HardwareRng {
    pub fn new(rng: RNG, rcc: &RCC) -> Self {
        rcc.ahb2enr.modify(|r, w| unsafe { w.bits(r.bits() | AHB2ENR_RNGEN) });
        rng.cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_RNGEN) });
        Self { rng, previous: None, seed_errors: 0 }
    }

    fn restart(&mut self) {
        self.rng.cr.modify(|r, w| unsafe { w.bits(r.bits() & !CR_RNGEN) });
        self.rng.cr.modify(|r, w| unsafe { w.bits(r.bits() | CR_RNGEN) });
        self.previous = None;
    }
}

impl rng::Rng for HardwareRng {
    type Error = Error;

    fn random_word(&mut self) -> nb::Result<u32, Self::Error> {
        let status = self.rng.sr.read().bits();
        if status & SR_SEIS != 0 {
            self.rng.sr.modify(|r, w| unsafe { w.bits(r.bits() & !SR_SEIS) });
            self.seed_errors += 1;
            if self.seed_errors > MAX_SEED_ERRORS {
                return Err(nb::Error::Other(Error::SeedError));
            }
            self.restart();
            return Err(nb::Error::WouldBlock);
        }
        if status & SR_CEIS != 0 {
            self.rng.sr.modify(|r, w| unsafe { w.bits(r.bits() & !SR_CEIS) });
            return Err(nb::Error::WouldBlock);
        }
        if status & SR_DRDY == 0 {
            return Err(nb::Error::WouldBlock);
        }

        let word = self.rng.dr.read().bits();
        match self.previous.replace(word) {
            // The first word after enabling only primes the comparison.
            None => Err(nb::Error::WouldBlock),
            Some(previous) if previous == word => Err(nb::Error::WouldBlock),
            Some(_) => Ok(word),
        }
    }
}
