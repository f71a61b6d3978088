//! The bypass wire codec (component C, transport half): carries the JSON
//! envelopes produced by `wire.rs` through tonic's length-delimited gRPC
//! framing without ever touching protobuf. Grounded on
//! `grpcurl-core::codec::DynamicCodec`, which does the analogous thing one
//! layer up (swapping prost-reflect's `DynamicMessage` in for a
//! compile-time generated type); here there is no intermediate message type
//! at all, just the envelope bytes.

use bytes::{Buf, Bytes, BytesMut};
use tonic::codec::{BufferSettings, Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

/// A gRPC codec that passes frame payloads through unchanged.
///
/// Every model is served through the same dynamic dispatcher, so there is no
/// per-method generated type to encode against; the dispatcher itself is
/// responsible for interpreting the bytes via `wire::decode_request` /
/// `wire::encode_response`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawEncoder;
    type Decoder = RawDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        RawEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawDecoder
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RawEncoder;

impl Encoder for RawEncoder {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put(item);
        Ok(())
    }

    fn buffer_settings(&self) -> BufferSettings {
        BufferSettings::default()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RawDecoder;

impl Decoder for RawDecoder {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        if !src.has_remaining() {
            return Ok(None);
        }
        let mut buf = BytesMut::with_capacity(src.remaining());
        buf.extend_from_slice(src.chunk());
        src.advance(buf.len());
        Ok(Some(buf.freeze()))
    }

    fn buffer_settings(&self) -> BufferSettings {
        BufferSettings::default()
    }
}
