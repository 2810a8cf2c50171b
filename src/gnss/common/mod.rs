
/// This module contains functionality related to tracking signals after acquisition
pub mod tracking;
