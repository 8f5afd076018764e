use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadItem, PayloadSize, ResponseHead, SendError};
use bytes::{Buf, BufMut, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

/// Encodes response heads and payload items into HTTP/1.1 wire bytes.
///
/// The encoder is a small state machine: a head selects the payload encoder for its
/// framing, payload items go through that encoder until the terminal item. After
/// [`upgrade`](ResponseEncoder::upgrade) the encoder becomes a pass-through and copies
/// chunks raw.
#[derive(Debug)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
    passthrough: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces http framing with a raw byte pass-through.
    pub fn upgrade(&mut self) {
        self.payload_encoder = None;
        self.passthrough = true;
    }

    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { header_encoder: HeaderEncoder, payload_encoder: None, passthrough: false }
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.passthrough {
            return match item {
                Message::Payload(PayloadItem::Chunk(bytes)) => {
                    dst.put(bytes);
                    Ok(())
                }
                Message::Payload(_) => Ok(()),
                Message::Header(_) => {
                    error!("receive response head after the connection was upgraded");
                    Err(io::Error::from(ErrorKind::InvalidInput).into())
                }
            };
        }

        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                self.payload_encoder = PayloadEncoder::for_size(payload_size);
                self.header_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let result = payload_encoder.encode(payload_item, dst);

                if payload_encoder.is_finish() {
                    self.payload_encoder.take();
                }

                result
            }
        }
    }
}
