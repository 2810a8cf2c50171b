
pub mod block;

pub mod filters;
pub mod io;
pub mod gnss;
pub mod types;

pub mod utils;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DigSigProcErr {
	#[error("invalid configuration: {0}")]
	Configuration(String),
	#[error("discriminator input is numerically degenerate")]
	NumericDegeneracy,
	#[error("sample underrun: needed {needed} samples, got {supplied}")]
	Underrun { needed: usize, supplied: usize },
	#[error("I/O error: {0}")]
	Io(String),
	#[error("{0}")]
	Other(&'static str),
}

impl From<std::io::Error> for DigSigProcErr {
	fn from(e:std::io::Error) -> Self { Self::Io(e.to_string()) }
}
