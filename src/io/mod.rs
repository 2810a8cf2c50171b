
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use log::{debug, warn};

use crate::DigSigProcErr;

/// Splits a raw sample stream into blocks of exactly one tracking epoch
pub struct EpochSource<R: Read> {
	src: R,
	item_size: usize,
	samples_per_epoch: usize,
	epochs_read: u64,
	done: bool,
}

impl<R: Read> EpochSource<R> {

	pub fn new(src:R, item_size:usize, samples_per_epoch:usize) -> Self {
		Self { src, item_size, samples_per_epoch, epochs_read: 0, done: false }
	}

	pub fn epoch_bytes(&self) -> usize { self.item_size * self.samples_per_epoch }

	pub fn epochs_read(&self) -> u64 { self.epochs_read }

	// Fills as much of buf as the source allows, returning the number of bytes read
	fn fill(&mut self, buf:&mut [u8]) -> Result<usize, DigSigProcErr> {
		let mut filled:usize = 0;
		while filled < buf.len() {
			match self.src.read(&mut buf[filled..]) {
				Ok(0) => break,
				Ok(n) => filled += n,
				Err(ref e) if e.kind() == ErrorKind::Interrupted => (),
				Err(e) => return Err(e.into()),
			}
		}
		Ok(filled)
	}

}

impl EpochSource<BufReader<File>> {

	pub fn open<P: AsRef<Path>>(path:P, item_size:usize, samples_per_epoch:usize) -> Result<Self, DigSigProcErr> {
		let file = File::open(path)?;
		Ok(Self::new(BufReader::new(file), item_size, samples_per_epoch))
	}

}

impl<R: Read> Iterator for EpochSource<R> {
	type Item = Result<Vec<u8>, DigSigProcErr>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done || self.epoch_bytes() == 0 { return None; }

		let mut buf:Vec<u8> = vec![0; self.epoch_bytes()];
		match self.fill(&mut buf) {
			Ok(n) if n == buf.len() => {
				self.epochs_read += 1;
				Some(Ok(buf))
			},
			Ok(0) => {
				debug!("End of input after {} epochs", self.epochs_read);
				self.done = true;
				None
			},
			Ok(n) => {
				warn!("Trailing partial epoch of {} bytes", n);
				self.done = true;
				Some(Err(DigSigProcErr::Underrun{ needed: self.samples_per_epoch, supplied: n / self.item_size }))
			},
			Err(e) => {
				self.done = true;
				Some(Err(e))
			}
		}
	}
}

#[cfg(test)]
mod tests {

	use std::io::Cursor;

	use super::*;

	#[test]
	fn whole_epochs_then_end() {
		let data:Vec<u8> = (0..64u8).collect();
		let mut src = EpochSource::new(Cursor::new(data), 4, 8);

		let first = src.next().unwrap().unwrap();
		assert_eq!(first, (0..32u8).collect::<Vec<u8>>());
		assert_eq!(src.next().unwrap().unwrap()[0], 32);
		assert!(src.next().is_none());
		assert_eq!(src.epochs_read(), 2);
	}

	#[test]
	fn partial_epoch_is_an_underrun() {
		let data:Vec<u8> = vec![0; 32 + 12];
		let results:Vec<Result<Vec<u8>, DigSigProcErr>> = EpochSource::new(Cursor::new(data), 4, 8).collect();

		assert_eq!(results.len(), 2);
		assert!(results[0].is_ok());
		assert_eq!(results[1], Err(DigSigProcErr::Underrun{ needed: 8, supplied: 3 }));
	}

	// Reader handing out a few bytes at a time
	struct Trickle { data: Vec<u8>, pos: usize }

	impl Read for Trickle {
		fn read(&mut self, buf:&mut [u8]) -> std::io::Result<usize> {
			let n = buf.len().min(3).min(self.data.len() - self.pos);
			buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
			self.pos += n;
			Ok(n)
		}
	}

	#[test]
	fn short_reads_are_reassembled() {
		let src = EpochSource::new(Trickle{ data: vec![7; 40], pos: 0 }, 2, 10);
		let epochs:Vec<Vec<u8>> = src.map(|r| r.unwrap()).collect();
		assert_eq!(epochs, vec![vec![7; 20], vec![7; 20]]);
	}

}
