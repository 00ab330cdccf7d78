//! The wire envelope: a tagged union over the seven message kinds.
//!
//! Frames travel as a flat JSON object with a `kind` discriminator string
//! and at most one populated body field; [`Envelope`] is the on-the-wire
//! shape (all body fields optional, extras silently ignored per spec), and
//! [`Message`] is the validated, kind-specific shape the rest of the
//! broker actually works with.

use crate::error::TfesError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `CONNECT` kind discriminator.
pub const KIND_CONNECT: &str = "schema.tfes.client.v1.connect";
/// `ACK` kind discriminator.
pub const KIND_ACK: &str = "schema.tfes.client.v1.ack";
/// `PUBLISH` kind discriminator.
pub const KIND_PUBLISH: &str = "schema.tfes.client.v1.publish";
/// `SUBSCRIBE` kind discriminator.
pub const KIND_SUBSCRIBE: &str = "schema.tfes.client.v1.subscribe";
/// `UNSUBSCRIBE` kind discriminator.
pub const KIND_UNSUBSCRIBE: &str = "schema.tfes.client.v1.unsubscribe";
/// `BOUNTY` kind discriminator.
pub const KIND_BOUNTY: &str = "schema.tfes.client.v1.bounty";
/// `PEER_CONNECT` kind discriminator.
pub const KIND_PEER_CONNECT: &str = "schema.tfes.peer.v1.connect";

/// `CONNECT` body. `user`/`password`/`token` are parsed but never enforced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectBody {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub suppress_acks: bool,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_group: String,
}

/// `ACK` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckBody {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `PUBLISH` body. `subject` must be concrete; `reply_to` is a pattern or empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishBody {
    pub subject: String,
    #[serde(default)]
    pub reply_to: String,
    #[serde(default)]
    pub body: Value,
}

/// `SUBSCRIBE` / `UNSUBSCRIBE` body: a single pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionBody {
    pub subject: String,
}

/// `BOUNTY` body, derived from the originating `PUBLISH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BountyBody {
    pub subject: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reply_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// `PEER_CONNECT` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConnectBody {
    pub peer_name: String,
    pub advertise_addr: String,
}

/// The raw on-the-wire envelope: one JSON object per NDJSON frame.
///
/// Only the field named by `kind` is semantically meaningful; any other
/// body field present is ignored, per spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<ConnectBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<AckBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<SubscriptionBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsubscribe: Option<SubscriptionBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounty: Option<BountyBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_connect: Option<PeerConnectBody>,
}

/// A decoded, kind-validated message.
///
/// This is what the routing table, client plane, and peer plane actually
/// pass around; [`Envelope`] is only the wire shape.
#[derive(Debug, Clone)]
pub enum Message {
    Connect {
        header: Option<Value>,
        body: ConnectBody,
    },
    Ack {
        header: Option<Value>,
        body: AckBody,
    },
    Publish {
        header: Option<Value>,
        body: PublishBody,
    },
    Subscribe {
        header: Option<Value>,
        subject: String,
    },
    Unsubscribe {
        header: Option<Value>,
        subject: String,
    },
    Bounty {
        header: Option<Value>,
        body: BountyBody,
    },
    PeerConnect {
        header: Option<Value>,
        body: PeerConnectBody,
    },
}

impl Message {
    /// Build a success `ACK`.
    #[must_use]
    pub fn ack_ok() -> Self {
        Self::Ack {
            header: None,
            body: AckBody {
                ok: true,
                message: None,
            },
        }
    }

    /// Build a failure `ACK` carrying `message` as the description.
    pub fn ack_err(message: impl Into<String>) -> Self {
        Self::Ack {
            header: None,
            body: AckBody {
                ok: false,
                message: Some(message.into()),
            },
        }
    }

    /// Derive the `BOUNTY` for a `PUBLISH`, preserving its header verbatim.
    #[must_use]
    pub fn bounty_from_publish(header: Option<Value>, publish: &PublishBody) -> Self {
        Self::Bounty {
            header,
            body: BountyBody {
                subject: publish.subject.clone(),
                reply_to: publish.reply_to.clone(),
                body: Some(publish.body.clone()),
            },
        }
    }

    /// The kind discriminator this message would serialize with.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => KIND_CONNECT,
            Self::Ack { .. } => KIND_ACK,
            Self::Publish { .. } => KIND_PUBLISH,
            Self::Subscribe { .. } => KIND_SUBSCRIBE,
            Self::Unsubscribe { .. } => KIND_UNSUBSCRIBE,
            Self::Bounty { .. } => KIND_BOUNTY,
            Self::PeerConnect { .. } => KIND_PEER_CONNECT,
        }
    }
}

impl From<Message> for Envelope {
    fn from(msg: Message) -> Self {
        let kind = msg.kind().to_string();
        match msg {
            Message::Connect { header, body } => Self {
                kind,
                header,
                connect: Some(body),
                ..Default::default()
            },
            Message::Ack { header, body } => Self {
                kind,
                header,
                ack: Some(body),
                ..Default::default()
            },
            Message::Publish { header, body } => Self {
                kind,
                header,
                publish: Some(body),
                ..Default::default()
            },
            Message::Subscribe { header, subject } => Self {
                kind,
                header,
                subscribe: Some(SubscriptionBody { subject }),
                ..Default::default()
            },
            Message::Unsubscribe { header, subject } => Self {
                kind,
                header,
                unsubscribe: Some(SubscriptionBody { subject }),
                ..Default::default()
            },
            Message::Bounty { header, body } => Self {
                kind,
                header,
                bounty: Some(body),
                ..Default::default()
            },
            Message::PeerConnect { header, body } => Self {
                kind,
                header,
                peer_connect: Some(body),
                ..Default::default()
            },
        }
    }
}

impl TryFrom<Envelope> for Message {
    type Error = TfesError;

    fn try_from(env: Envelope) -> Result<Self, Self::Error> {
        let header = env.header;
        match env.kind.as_str() {
            KIND_CONNECT => Ok(Self::Connect {
                header,
                body: env.connect.unwrap_or_default(),
            }),
            KIND_ACK => {
                let body = env
                    .ack
                    .ok_or_else(|| TfesError::invalid_frame("ack kind without ack body"))?;
                Ok(Self::Ack { header, body })
            }
            KIND_PUBLISH => {
                let body = env
                    .publish
                    .ok_or_else(|| TfesError::invalid_frame("publish kind without publish body"))?;
                Ok(Self::Publish { header, body })
            }
            KIND_SUBSCRIBE => {
                let body = env.subscribe.ok_or_else(|| {
                    TfesError::invalid_frame("subscribe kind without subscribe body")
                })?;
                Ok(Self::Subscribe {
                    header,
                    subject: body.subject,
                })
            }
            KIND_UNSUBSCRIBE => {
                let body = env.unsubscribe.ok_or_else(|| {
                    TfesError::invalid_frame("unsubscribe kind without unsubscribe body")
                })?;
                Ok(Self::Unsubscribe {
                    header,
                    subject: body.subject,
                })
            }
            KIND_BOUNTY => {
                let body = env
                    .bounty
                    .ok_or_else(|| TfesError::invalid_frame("bounty kind without bounty body"))?;
                Ok(Self::Bounty { header, body })
            }
            KIND_PEER_CONNECT => {
                let body = env.peer_connect.ok_or_else(|| {
                    TfesError::invalid_frame("peer_connect kind without peer_connect body")
                })?;
                Ok(Self::PeerConnect { header, body })
            }
            other => Err(TfesError::invalid_frame(format!(
                "unknown message kind {other:?}"
            ))),
        }
    }
}
