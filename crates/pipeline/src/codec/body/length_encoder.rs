use crate::ensure;
use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

/// Copies payload bytes raw, checking them against the declared `content-length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    remaining: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            warn!("encode payload_item but no need to encode anymore");
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(bytes) => {
                let size = bytes.remaining() as u64;
                ensure!(
                    size <= self.remaining,
                    SendError::invalid_body(format!("body exceeds content-length by {} bytes", size - self.remaining))
                );
                dst.put(bytes);
                self.remaining -= size;
                Ok(())
            }
            PayloadItem::Trailers(_) => {
                warn!("content-length framing can't carry trailers, dropping them");
                self.finish()
            }
            PayloadItem::Eof => self.finish(),
        }
    }
}

impl LengthEncoder {
    fn finish(&mut self) -> Result<(), SendError> {
        self.eof = true;
        ensure!(
            self.remaining == 0,
            SendError::invalid_body(format!("body ended {} bytes short of content-length", self.remaining))
        );
        Ok(())
    }
}
