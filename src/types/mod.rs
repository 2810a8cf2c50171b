use std::fmt;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use num_complex::Complex;
use num_traits::ToPrimitive;
use serde::{Serialize, Deserialize};

use crate::DigSigProcErr;

/// One real component (I or Q) of a raw interleaved sample stream.
pub trait IqComponent: ToPrimitive + Copy + Default + Send + Sync + 'static {
	const SIZE: usize;
	fn read_le(buf:&[u8]) -> Self;
}

impl IqComponent for i16 {
	const SIZE: usize = 2;
	fn read_le(buf:&[u8]) -> Self { LittleEndian::read_i16(buf) }
}

impl IqComponent for f32 {
	const SIZE: usize = 4;
	fn read_le(buf:&[u8]) -> Self { LittleEndian::read_f32(buf) }
}

impl IqComponent for f64 {
	const SIZE: usize = 8;
	fn read_le(buf:&[u8]) -> Self { LittleEndian::read_f64(buf) }
}

/// A complex baseband sample the tracking core can be instantiated over.  The concrete type is picked once, when a
/// channel is built, and every epoch afterwards goes through the same monomorphized code path.
pub trait IqSample: Copy + Default + Send + Sync + 'static {
	const ITEM_SIZE: usize;

	fn to_complex(&self) -> Complex<f64>;

	/// Decodes one sample from the first `ITEM_SIZE` bytes of `buf` (interleaved I then Q, little-endian)
	fn read_le(buf:&[u8]) -> Self;
}

impl<T: IqComponent> IqSample for Complex<T> {
	const ITEM_SIZE: usize = 2 * T::SIZE;

	fn to_complex(&self) -> Complex<f64> {
		Complex{ re: self.re.to_f64().unwrap_or_default(), im: self.im.to_f64().unwrap_or_default() }
	}

	fn read_le(buf:&[u8]) -> Self {
		Complex{ re: T::read_le(&buf[..T::SIZE]), im: T::read_le(&buf[T::SIZE..2*T::SIZE]) }
	}
}

/// Decodes a byte slice into `out`, one sample per `S::ITEM_SIZE` bytes.  Trailing bytes that don't make up a full
/// sample are ignored.
pub fn decode_samples<S: IqSample>(raw:&[u8], out:&mut Vec<S>) {
	out.clear();
	out.extend(raw.chunks_exact(S::ITEM_SIZE).map(S::read_le));
}

/// Sample representation of the input stream, named the way receiver configuration files name it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
	#[serde(rename = "gr_complex")]
	GrComplex,
	#[serde(rename = "cshort")]
	CShort,
}

impl Default for ItemType {
	fn default() -> Self { ItemType::GrComplex }
}

impl ItemType {

	pub fn item_size(&self) -> usize {
		match self {
			ItemType::GrComplex => <Complex<f32> as IqSample>::ITEM_SIZE,
			ItemType::CShort    => <Complex<i16> as IqSample>::ITEM_SIZE,
		}
	}

}

impl FromStr for ItemType {
	type Err = DigSigProcErr;

	fn from_str(s:&str) -> Result<Self, Self::Err> {
		match s {
			"gr_complex" => Ok(ItemType::GrComplex),
			"cshort"     => Ok(ItemType::CShort),
			other        => Err(DigSigProcErr::Configuration(format!("unknown tracking item type {:?}", other))),
		}
	}
}

impl fmt::Display for ItemType {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
		match self {
			ItemType::GrComplex => write!(f, "gr_complex"),
			ItemType::CShort    => write!(f, "cshort"),
		}
	}
}

#[cfg(test)]
mod tests {

	use byteorder::WriteBytesExt;

	use super::*;

	#[test]
	fn decodes_cshort_little_endian() {
		let mut raw:Vec<u8> = vec![];
		for v in &[-3i16, 7, 1200, -32768] { raw.write_i16::<LittleEndian>(*v).unwrap(); }

		let mut out:Vec<Complex<i16>> = vec![];
		decode_samples(&raw, &mut out);

		assert_eq!(out.len(), 2);
		assert_eq!(out[0].to_complex(), Complex{ re: -3.0, im: 7.0 });
		assert_eq!(out[1].to_complex(), Complex{ re: 1200.0, im: -32768.0 });
	}

	#[test]
	fn decodes_gr_complex_and_drops_partial_sample() {
		let mut raw:Vec<u8> = vec![];
		for v in &[0.5f32, -0.25] { raw.write_f32::<LittleEndian>(*v).unwrap(); }
		raw.push(0xFF);

		let mut out:Vec<Complex<f32>> = vec![];
		decode_samples(&raw, &mut out);

		assert_eq!(out.len(), 1);
		assert_eq!(out[0].to_complex(), Complex{ re: 0.5, im: -0.25 });
	}

	#[test]
	fn decodes_double_precision_samples() {
		let mut raw:Vec<u8> = vec![];
		for v in &[1.0e-3f64, -2.5, 0.0, 7.125] { raw.write_f64::<LittleEndian>(*v).unwrap(); }

		let mut out:Vec<Complex<f64>> = vec![];
		decode_samples(&raw, &mut out);

		assert_eq!(<Complex<f64> as IqSample>::ITEM_SIZE, 16);
		assert_eq!(out, vec![Complex{ re: 1.0e-3, im: -2.5 }, Complex{ re: 0.0, im: 7.125 }]);
	}

	#[test]
	fn item_type_names() {
		assert_eq!("cshort".parse::<ItemType>().unwrap(), ItemType::CShort);
		assert_eq!(ItemType::GrComplex.item_size(), 8);
		assert_eq!(ItemType::CShort.item_size(), 4);
		assert!("cbyte".parse::<ItemType>().is_err());
		assert_eq!(serde_json::to_string(&ItemType::GrComplex).unwrap(), "\"gr_complex\"");
	}

}
