//! Response decoding
//!
//! The [`ResponseDecoder`] picks a strategy from the declared return shape;
//! structured shapes are parsed through a [`Codec`].

pub mod codec;
pub mod decoder;

pub use codec::{Codec, CodecError, JsonCodec};
pub use decoder::ResponseDecoder;
