use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};
use tracing::trace;

mod message;

pub use message::{
    Access, Chat, Color, ColorParseError, Connection, Draw, Message, Role, ShapeKind, ALL,
    MANAGER, SERVER,
};

// encode and decode go through serde json, each frame carries exactly one
// record behind a 2 byte big endian length, the same framing as java's writeUTF
const LENGTH_FIELD_LEN: usize = 2;
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record of {0} bytes exceeds frame limit")]
    Oversize(usize),
}

pub struct FrameCodec {
    frames: LengthDelimitedCodec,
}

impl FrameCodec {
    pub fn new() -> Self {
        let frames = LengthDelimitedCodec::builder()
            .length_field_length(LENGTH_FIELD_LEN)
            .max_frame_length(MAX_FRAME_LEN)
            .big_endian()
            .new_codec();

        FrameCodec { frames }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// convert length prefixed bytes into Message
impl Decoder for FrameCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.decode(src)? {
            Some(frame) => {
                trace!("decoding frame of {} bytes", frame.len());
                // from_slice rejects invalid utf8 as well as bad json
                let msg = serde_json::from_slice(&frame)?;
                Ok(Some(msg))
            }
            None => Ok(None),
        }
    }
}

// Take Message and convert it to length prefixed bytes
impl Encoder<Message> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        Encoder::<&Message>::encode(self, &item, dst)
    }
}

impl<'a> Encoder<&'a Message> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &'a Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(item)?;
        if json.len() > MAX_FRAME_LEN {
            return Err(CodecError::Oversize(json.len()))
        }
        self.frames.encode(Bytes::from(json), dst)?;
        Ok(())
    }
}
