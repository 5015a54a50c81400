//! Vector codecs. A [`Quantizer`] owns the corpus-wide codec parameters and
//! is the only place raw vectors are turned into stored codes.

pub mod binary_quant;
pub mod codec;
pub mod pq;
pub mod quantizer;
pub mod scalar_quant;

pub use codec::CodecSpec;
pub use quantizer::{Codec, QuantizedVector, Quantizer};

#[cfg(test)]
mod tests;
