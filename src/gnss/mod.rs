
/// Functionality shared by every signal: correlation, loop discriminators, lock detection and the tracking engine
pub mod common;

pub mod glonass_l1_ca;
