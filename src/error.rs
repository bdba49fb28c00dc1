//! Error type for the loader as a whole.
//!
//! Every error is terminal. What matters is where it sends the automaton:
//! [`Error::escalation`] routes authenticity and fault errors to the
//! security breach state, and everything else to the plain error state.
use crate::devices::automaton::Request;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Error {
    DriverError(&'static str),
    InvalidTransition,
    ControlFlowViolation,
    NoBootableBank,
    RollbackDetected,
    PartitionMismatch,
    CrcInvalid,
    HashInvalid,
    FirmwareTooLarge,
    SignatureTooLong,
    FaultDetected,
    InvalidEntryPoint,
    EraseMarkerCorrupted,
    FlashUnprotected,
}

/// Driver errors that can be lifted into a loader [`Error`].
pub trait Convertible {
    fn into_error(self) -> Error;
}

impl<T: Convertible> From<T> for Error {
    fn from(t: T) -> Self { t.into_error() }
}

impl Error {
    /// Request the automaton issues after this error.
    pub fn escalation(&self) -> Request {
        match self {
            Error::DriverError(_)
            | Error::InvalidTransition
            | Error::InvalidEntryPoint => Request::ERROR,
            Error::ControlFlowViolation
            | Error::NoBootableBank
            | Error::RollbackDetected
            | Error::PartitionMismatch
            | Error::CrcInvalid
            | Error::HashInvalid
            | Error::FirmwareTooLarge
            | Error::SignatureTooLong
            | Error::FaultDetected
            | Error::EraseMarkerCorrupted
            | Error::FlashUnprotected => Request::SECBREACH,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Error::DriverError(text) => text,
            Error::InvalidTransition => "invalid transition",
            Error::ControlFlowViolation => "control flow violation",
            Error::NoBootableBank => "no bootable bank",
            Error::RollbackDetected => "rollback detected",
            Error::PartitionMismatch => "partition type does not match bank",
            Error::CrcInvalid => "header CRC mismatch",
            Error::HashInvalid => "firmware hash mismatch",
            Error::FirmwareTooLarge => "firmware larger than its partition",
            Error::SignatureTooLong => "signature longer than its slot",
            Error::FaultDetected => "redundant check disagreement",
            Error::InvalidEntryPoint => "unknown entry point",
            Error::EraseMarkerCorrupted => "erase marker cannot be completed",
            Error::FlashUnprotected => "flash read protection too weak",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::doubles::error::FakeError;

    #[test]
    fn authenticity_failures_escalate_to_security_breach() {
        for error in [
            Error::CrcInvalid,
            Error::HashInvalid,
            Error::PartitionMismatch,
            Error::NoBootableBank,
            Error::RollbackDetected,
            Error::ControlFlowViolation,
            Error::SignatureTooLong,
        ] {
            assert_eq!(error.escalation(), Request::SECBREACH);
        }
    }

    #[test]
    fn driver_failures_escalate_to_error() {
        let error: Error = FakeError.into();
        assert_eq!(error.escalation(), Request::ERROR);
        assert_eq!(Error::InvalidTransition.escalation(), Request::ERROR);
        assert_eq!(Error::InvalidEntryPoint.escalation(), Request::ERROR);
    }
}
