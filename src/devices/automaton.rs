//! Loader state machine.
//!
//! States and requests are bit patterns far apart from each other rather
//! than dense integers, so that a single corrupted bit cannot turn one valid
//! value into another. Legal transitions live in a table in read-only memory;
//! any (state, request) pair missing from it is invalid.
use static_assertions::const_assert;

use crate::utilities::logging::error;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct State(u32);

impl State {
    pub const START: State = State(0x0000_0003);
    pub const INIT: State = State(0x0000_000C);
    pub const RDPCHECK: State = State(0x0000_0035);
    pub const DFUWAIT: State = State(0x0000_00CA);
    pub const SELECTBANK: State = State(0x0000_0350);
    pub const HDRCRC: State = State(0x0000_0CA3);
    pub const FWINTEGRITY: State = State(0x0000_35CF);
    pub const FLASHLOCK: State = State(0x0000_CA0C);
    pub const BOOTFW: State = State(0x0003_5C30);
    pub const ERROR: State = State(0x000C_A3F3);
    pub const SECBREACH: State = State(0x0035_CFCF);

    pub const ALL: [State; 11] = [
        Self::START,
        Self::INIT,
        Self::RDPCHECK,
        Self::DFUWAIT,
        Self::SELECTBANK,
        Self::HDRCRC,
        Self::FWINTEGRITY,
        Self::FLASHLOCK,
        Self::BOOTFW,
        Self::ERROR,
        Self::SECBREACH,
    ];

    pub const fn bits(self) -> u32 { self.0 }

    /// Only the exact patterns of [`State::ALL`] are states.
    pub fn from_bits(bits: u32) -> Option<State> {
        Self::ALL.iter().copied().find(|state| state.0 == bits)
    }

    pub fn is_valid(self) -> bool { Self::from_bits(self.0).is_some() }

    pub fn is_terminal(self) -> bool { self == Self::ERROR || self == Self::SECBREACH }

    pub fn name(self) -> &'static str {
        match self {
            Self::START => "START",
            Self::INIT => "INIT",
            Self::RDPCHECK => "RDPCHECK",
            Self::DFUWAIT => "DFUWAIT",
            Self::SELECTBANK => "SELECTBANK",
            Self::HDRCRC => "HDRCRC",
            Self::FWINTEGRITY => "FWINTEGRITY",
            Self::FLASHLOCK => "FLASHLOCK",
            Self::BOOTFW => "BOOTFW",
            Self::ERROR => "ERROR",
            Self::SECBREACH => "SECBREACH",
            _ => "<invalid>",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct Request(u32);

impl Request {
    pub const INIT: Request = Request(0x0300_0003);
    pub const RDPCHECK: Request = Request(0x0500_000C);
    pub const DFUCHECK: Request = Request(0x3A00_0035);
    pub const SELECTBANK: Request = Request(0x5C00_00CA);
    pub const CRCCHECK: Request = Request(0xAF00_0350);
    pub const INTEGRITYCHECK: Request = Request(0xC300_0CA3);
    pub const FLASHLOCK: Request = Request(0xF500_35CF);
    pub const BOOT: Request = Request(0xFA00_CA0C);
    pub const ERROR: Request = Request(0xFC0C_A3F3);
    pub const SECBREACH: Request = Request(0xFF35_CFCF);

    pub const ALL: [Request; 10] = [
        Self::INIT,
        Self::RDPCHECK,
        Self::DFUCHECK,
        Self::SELECTBANK,
        Self::CRCCHECK,
        Self::INTEGRITYCHECK,
        Self::FLASHLOCK,
        Self::BOOT,
        Self::ERROR,
        Self::SECBREACH,
    ];

    pub const fn bits(self) -> u32 { self.0 }

    pub fn name(self) -> &'static str {
        match self {
            Self::INIT => "INIT",
            Self::RDPCHECK => "RDPCHECK",
            Self::DFUCHECK => "DFUCHECK",
            Self::SELECTBANK => "SELECTBANK",
            Self::CRCCHECK => "CRCCHECK",
            Self::INTEGRITYCHECK => "INTEGRITYCHECK",
            Self::FLASHLOCK => "FLASHLOCK",
            Self::BOOT => "BOOT",
            Self::ERROR => "ERROR",
            Self::SECBREACH => "SECBREACH",
            _ => "<invalid>",
        }
    }
}

const fn minimum_distance(patterns: &[u32]) -> u32 {
    let mut minimum = u32::MAX;
    let mut i = 0;
    while i < patterns.len() {
        let mut j = i + 1;
        while j < patterns.len() {
            let distance = (patterns[i] ^ patterns[j]).count_ones();
            if distance < minimum {
                minimum = distance;
            }
            j += 1;
        }
        i += 1;
    }
    minimum
}

const STATE_BITS: [u32; 11] = {
    let mut bits = [0u32; 11];
    let mut i = 0;
    while i < bits.len() {
        bits[i] = State::ALL[i].0;
        i += 1;
    }
    bits
};

const REQUEST_BITS: [u32; 10] = {
    let mut bits = [0u32; 10];
    let mut i = 0;
    while i < bits.len() {
        bits[i] = Request::ALL[i].0;
        i += 1;
    }
    bits
};

const_assert!(minimum_distance(&STATE_BITS) >= 4);
const_assert!(minimum_distance(&REQUEST_BITS) >= 4);

/// Upper bound on the legal transitions out of a single state.
pub const MAX_TRANSITIONS: usize = 8;

pub struct Transition {
    pub request: Request,
    pub target: State,
}

pub struct Transitions {
    pub state: State,
    pub transitions: &'static [Transition],
}

const fn to(request: Request, target: State) -> Transition { Transition { request, target } }

/// Every non terminal state may fail into one of the terminal states.
macro_rules! transitions {
    ($state:expr => [$($request:expr => $target:expr),* $(,)?]) => {
        Transitions {
            state: $state,
            transitions: &[
                $(to($request, $target),)*
                to(Request::ERROR, State::ERROR),
                to(Request::SECBREACH, State::SECBREACH),
            ],
        }
    };
}

const TABLE: [Transitions; 11] = [
    transitions!(State::START => [Request::INIT => State::INIT]),
    transitions!(State::INIT => [Request::RDPCHECK => State::RDPCHECK]),
    transitions!(State::RDPCHECK => [
        Request::DFUCHECK => State::DFUWAIT,
        Request::SELECTBANK => State::SELECTBANK,
        Request::CRCCHECK => State::HDRCRC,
        Request::INTEGRITYCHECK => State::FWINTEGRITY,
        Request::FLASHLOCK => State::FLASHLOCK,
        Request::BOOT => State::BOOTFW,
    ]),
    transitions!(State::DFUWAIT => [Request::RDPCHECK => State::RDPCHECK]),
    transitions!(State::SELECTBANK => [Request::RDPCHECK => State::RDPCHECK]),
    transitions!(State::HDRCRC => [Request::RDPCHECK => State::RDPCHECK]),
    transitions!(State::FWINTEGRITY => [Request::RDPCHECK => State::RDPCHECK]),
    transitions!(State::FLASHLOCK => [Request::RDPCHECK => State::RDPCHECK]),
    transitions!(State::BOOTFW => []),
    Transitions { state: State::ERROR, transitions: &[] },
    Transitions { state: State::SECBREACH, transitions: &[] },
];

/// Read-only table of every legal transition.
pub static TRANSITION_TABLE: [Transitions; 11] = TABLE;

const fn table_is_bounded(table: &[Transitions]) -> bool {
    let mut i = 0;
    while i < table.len() {
        if table[i].transitions.len() > MAX_TRANSITIONS {
            return false;
        }
        i += 1;
    }
    true
}

const_assert!(table_is_bounded(&TABLE));

/// Owner of the current loader state.
pub struct Automaton {
    state: State,
}

impl Default for Automaton {
    fn default() -> Self { Self::new() }
}

impl Automaton {
    pub fn new() -> Self { Self { state: State::START } }

    /// Current state. A stored value that is not an exact state pattern
    /// has been corrupted, and reads as ERROR from then on.
    pub fn get_state(&mut self) -> State {
        if !self.state.is_valid() {
            self.state = State::ERROR;
        }
        self.state
    }

    /// Fails safe: a target that is not an exact state pattern forces ERROR.
    pub fn set_state(&mut self, state: State) {
        self.state = if state.is_valid() { state } else { State::ERROR };
    }

    /// Target of `request` out of `state`, if the table allows it.
    pub fn next_state(&self, state: State, request: Request) -> Option<State> {
        TRANSITION_TABLE
            .iter()
            .find(|entry| entry.state == state)?
            .transitions
            .iter()
            .find(|transition| transition.request == request)
            .map(|transition| transition.target)
    }

    /// Whether the table allows `request` out of `state`. An invalid pair
    /// forces the automaton into ERROR.
    pub fn is_valid_transition(&mut self, state: State, request: Request) -> bool {
        if self.next_state(state, request).is_some() {
            return true;
        }
        error!("Invalid transition: {} cannot take {}", state.name(), request.name());
        self.state = State::ERROR;
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn listed(state: State, request: Request) -> bool {
        TRANSITION_TABLE.iter().filter(|entry| entry.state == state).any(|entry| {
            entry.transitions.iter().any(|transition| transition.request == request)
        })
    }

    #[test]
    fn every_state_has_exactly_one_table_entry() {
        for state in State::ALL {
            assert_eq!(TRANSITION_TABLE.iter().filter(|entry| entry.state == state).count(), 1);
        }
    }

    #[test]
    fn pairs_outside_the_table_are_rejected_and_force_error() {
        for state in State::ALL {
            for request in Request::ALL {
                if listed(state, request) {
                    continue;
                }
                // Given
                let mut automaton = Automaton::new();
                automaton.set_state(State::SELECTBANK);

                // When
                let valid = automaton.is_valid_transition(state, request);

                // Then
                assert!(!valid, "{} accepted {}", state.name(), request.name());
                assert_eq!(automaton.get_state(), State::ERROR);
                assert_eq!(automaton.next_state(state, request), None);
            }
        }
    }

    #[test]
    fn pairs_in_the_table_are_accepted_without_side_effects() {
        let mut automaton = Automaton::new();
        assert!(automaton.is_valid_transition(State::START, Request::INIT));
        assert!(automaton.is_valid_transition(State::RDPCHECK, Request::BOOT));
        assert_eq!(automaton.get_state(), State::START);
        assert_eq!(automaton.next_state(State::RDPCHECK, Request::CRCCHECK), Some(State::HDRCRC));
        assert_eq!(automaton.next_state(State::HDRCRC, Request::SECBREACH), Some(State::SECBREACH));
    }

    #[test]
    fn terminal_states_have_no_way_out() {
        let mut automaton = Automaton::new();
        for request in Request::ALL {
            assert!(!automaton.is_valid_transition(State::ERROR, request));
            assert!(!automaton.is_valid_transition(State::SECBREACH, request));
        }
    }

    #[test]
    fn corrupted_states_read_as_error() {
        let mut automaton = Automaton::new();
        automaton.set_state(State(State::FLASHLOCK.bits() ^ 0x10));
        assert_eq!(automaton.get_state(), State::ERROR);

        let mut automaton = Automaton { state: State(State::BOOTFW.bits() ^ 0x1) };
        assert_eq!(automaton.get_state(), State::ERROR);
    }

    #[test]
    fn encodings_are_far_apart() {
        assert!(minimum_distance(&STATE_BITS) >= 4);
        assert!(minimum_distance(&REQUEST_BITS) >= 4);
        assert_eq!(State::from_bits(0x35), Some(State::RDPCHECK));
        assert_eq!(State::from_bits(0x34), None);
    }
}
