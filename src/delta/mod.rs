// Delta generation and parsing.
//
// - `command`: command byte table and big-endian parameter codec
// - `encoder`: streaming DeltaEncoder driven by a SignatureIndex
// - `decoder`: DeltaReader, a lazy iterator of instructions
// - `window`: ring buffer behind the encoder's sliding window

pub mod command;
pub mod decoder;
pub mod encoder;
mod window;

pub use command::DELTA_MAGIC;
pub use decoder::{DeltaReader, Instruction};
pub use encoder::{
    DeltaEncoder, DeltaStats, EncodeOptions, delta_all, encode_delta, encode_delta_with_options,
};
