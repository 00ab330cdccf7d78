//! Newline-delimited JSON framing.
//!
//! [`MessageDecoder`] accumulates bytes across partial reads into a staging
//! buffer (mirroring the reassembly-buffer shape of a length-prefixed
//! decoder, simplified here to a newline scan since NDJSON carries no
//! length header) and yields zero or more fully-framed messages per `feed`.
//! [`encode`] appends the trailing `\n` a writer flushes after each frame.

use crate::error::TfesError;
use crate::message::{Envelope, Message};
use bytes::{Buf, BytesMut};

/// Default initial capacity for the staging buffer.
const STAGING_INITIAL_CAP: usize = 256;

/// Frames larger than this are rejected and the connection must be dropped.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// The outcome of decoding one complete NDJSON line.
#[derive(Debug)]
pub enum Frame {
    /// A well-formed, kind-recognized message.
    Message(Message),
    /// Malformed JSON or an unrecognized `kind`; recoverable — the caller
    /// should emit an error ACK and keep the connection open.
    Invalid(TfesError),
}

/// Stateful NDJSON decoder. One instance per connection.
#[derive(Debug)]
pub struct MessageDecoder {
    staging: BytesMut,
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            staging: BytesMut::with_capacity(STAGING_INITIAL_CAP),
        }
    }

    /// Appends freshly-read bytes to the staging buffer.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.staging.extend_from_slice(chunk);
    }

    /// Pulls the next complete frame out of the staging buffer, if any.
    ///
    /// Call this in a loop after every `feed` until it returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the buffer holds more than
    /// [`MAX_FRAME_SIZE`] bytes with no newline in sight — this is fatal and
    /// the connection must be closed. A malformed JSON line or unrecognized
    /// `kind` is reported as `Ok(Some(Frame::Invalid(_)))`, which is
    /// recoverable.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, TfesError> {
        let Some(pos) = self.staging.iter().position(|&b| b == b'\n') else {
            if self.staging.len() > MAX_FRAME_SIZE {
                return Err(TfesError::invalid_frame(format!(
                    "frame exceeds {MAX_FRAME_SIZE} bytes with no delimiter"
                )));
            }
            return Ok(None);
        };

        let line = self.staging.split_to(pos);
        self.staging.advance(1); // drop the '\n' itself

        if line.len() > MAX_FRAME_SIZE {
            return Err(TfesError::invalid_frame(format!(
                "frame of {} bytes exceeds {MAX_FRAME_SIZE} byte ceiling",
                line.len()
            )));
        }

        let frame = match serde_json::from_slice::<Envelope>(&line) {
            Ok(env) => match Message::try_from(env) {
                Ok(msg) => Frame::Message(msg),
                Err(e) => Frame::Invalid(e),
            },
            Err(e) => Frame::Invalid(TfesError::invalid_frame(e.to_string())),
        };

        Ok(Some(frame))
    }
}

/// Encodes `msg` as one NDJSON line, including the trailing `\n`.
///
/// # Errors
///
/// Returns an error if `msg` cannot be serialized as JSON (never happens
/// for values built from this crate's own constructors).
pub fn encode(msg: &Message) -> Result<Vec<u8>, TfesError> {
    let env: Envelope = msg.clone().into();
    let mut buf =
        serde_json::to_vec(&env).map_err(|e| TfesError::invalid_frame(e.to_string()))?;
    buf.push(b'\n');
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::PublishBody;

    #[test]
    fn decodes_one_frame_per_line() {
        let mut dec = MessageDecoder::new();
        let wire = b"{\"kind\":\"schema.tfes.client.v1.subscribe\",\"subscribe\":{\"subject\":\"a.b\"}}\n";
        dec.feed(wire);
        let frame = dec.next_frame().unwrap().unwrap();
        match frame {
            Frame::Message(Message::Subscribe { subject, .. }) => assert_eq!(subject, "a.b"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(dec.next_frame().unwrap().is_none());
    }

    #[test]
    fn reassembles_a_frame_split_across_feeds() {
        let mut dec = MessageDecoder::new();
        let whole = b"{\"kind\":\"schema.tfes.client.v1.subscribe\",\"subscribe\":{\"subject\":\"a.b\"}}\n";
        let (a, b) = whole.split_at(10);
        dec.feed(a);
        assert!(dec.next_frame().unwrap().is_none());
        dec.feed(b);
        assert!(matches!(
            dec.next_frame().unwrap().unwrap(),
            Frame::Message(Message::Subscribe { .. })
        ));
    }

    #[test]
    fn two_frames_in_one_feed() {
        let mut dec = MessageDecoder::new();
        dec.feed(b"{\"kind\":\"schema.tfes.client.v1.ack\",\"ack\":{\"ok\":true}}\n{\"kind\":\"schema.tfes.client.v1.ack\",\"ack\":{\"ok\":false}}\n");
        let mut acks = Vec::new();
        while let Some(Frame::Message(Message::Ack { body, .. })) = dec.next_frame().unwrap() {
            acks.push(body.ok);
        }
        assert_eq!(acks, vec![true, false]);
    }

    #[test]
    fn malformed_json_is_recoverable_not_fatal() {
        let mut dec = MessageDecoder::new();
        dec.feed(b"not json at all\n");
        match dec.next_frame().unwrap().unwrap() {
            Frame::Invalid(_) => {}
            other => panic!("expected invalid frame, got {other:?}"),
        }
    }

    #[test]
    fn oversized_frame_without_delimiter_is_fatal() {
        let mut dec = MessageDecoder::new();
        let huge = vec![b'a'; MAX_FRAME_SIZE + 1];
        dec.feed(&huge);
        assert!(dec.next_frame().is_err());
    }

    #[test]
    fn encode_round_trips_through_decode() {
        let msg = Message::Publish {
            header: None,
            body: PublishBody {
                subject: "x.y".into(),
                reply_to: String::new(),
                body: serde_json::json!({"n": 1}),
            },
        };
        let wire = encode(&msg).unwrap();
        assert_eq!(*wire.last().unwrap(), b'\n');
        let mut dec = MessageDecoder::new();
        dec.feed(&wire);
        assert!(matches!(
            dec.next_frame().unwrap().unwrap(),
            Frame::Message(Message::Publish { .. })
        ));
    }
}
