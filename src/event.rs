use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Why a raw payload could not be turned into typed alerts.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not an object, or no string `type` field.
    #[error("event is not an object with a `type` field: {0}")]
    Envelope(#[source] serde_json::Error),

    /// A known event type whose `message` is not an array.
    #[error("`message` of a `{kind}` event is not an array")]
    MessageNotArray { kind: String },

    /// An entry of `message` has the wrong shape. Only that entry is lost.
    #[error("message #{index} is malformed: {source}")]
    Item {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    /// An amount that does not read as a number.
    #[error("{kind} amount {value} is not a number")]
    InvalidAmount { kind: &'static str, value: String },

    /// A cheer or donation without an amount.
    #[error("{kind} has no amount")]
    MissingAmount { kind: &'static str },

    /// A donation without a currency code.
    #[error("donation has no currency")]
    MissingCurrency,
}

/// The `type` tag of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Donation,
    Subscription,
    Resub,
    Bits,
    /// Any other tag (follows, hosts, raids, ...). Ignored by the relay.
    Other(String),
}

impl EventKind {
    /// Map a wire tag to a kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "donation" => EventKind::Donation,
            "subscription" => EventKind::Subscription,
            "resub" => EventKind::Resub,
            "bits" => EventKind::Bits,
            other => EventKind::Other(other.to_string()),
        }
    }

    /// Whether the relay acts on this kind at all.
    pub fn is_monetary(&self) -> bool {
        !matches!(self, EventKind::Other(_))
    }
}

/// One entry of an event's `message` array.
///
/// Key spelling follows the feed (`subPlan`, `isTest`), with snake_case
/// accepted as well. Type-specific fields stay loosely typed here; the
/// classifier validates them for the event kind at hand.
#[derive(Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub struct Message {
    /// Unique message identifier (`_id`, else `id`).
    pub id: Option<String>,
    /// Display name of the sender.
    pub name: String,
    /// Sent from the dashboard's "test alert" button.
    pub is_test: bool,
    /// Replayed by the streamer.
    pub repeat: bool,
    /// Replayed by the streamer, bypassing the alert queue.
    pub force_repeat: bool,
    /// Raw amount, a string or a number on the wire.
    pub amount: Option<Value>,
    /// ISO currency code of a donation.
    pub currency: Option<String>,
    /// Subscription plan identifier.
    pub sub_plan: Option<String>,
    /// Cumulative subscription months.
    pub months: Option<u32>,
}

impl Message {
    /// A message with only an identifier set.
    pub fn with_id(id: impl Into<String>) -> Self {
        Message {
            id: Some(id.into()),
            ..Message::default()
        }
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Value,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default, rename = "_id")]
    underscore_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "isTest", alias = "is_test")]
    is_test: Option<bool>,
    #[serde(default)]
    repeat: Option<bool>,
    #[serde(default, rename = "forceRepeat", alias = "force_repeat")]
    force_repeat: Option<bool>,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default, rename = "subPlan", alias = "sub_plan")]
    sub_plan: Option<Value>,
    #[serde(default)]
    months: Option<Value>,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        Message {
            id: raw
                .underscore_id
                .as_ref()
                .and_then(scalar_text)
                .or_else(|| raw.id.as_ref().and_then(scalar_text)),
            name: raw.name.unwrap_or_default(),
            is_test: raw.is_test.unwrap_or(false),
            repeat: raw.repeat.unwrap_or(false),
            force_repeat: raw.force_repeat.unwrap_or(false),
            amount: raw.amount.filter(|v| !v.is_null()),
            currency: raw.currency,
            sub_plan: raw.sub_plan.as_ref().and_then(scalar_text),
            months: raw.months.as_ref().and_then(|v| match v {
                Value::Number(n) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }),
        }
    }
}

/// Strings as-is, numbers in their JSON spelling; anything else is absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A decoded inbound event: its kind and the messages it carries.
///
/// Entries of `message` decode independently, in order; one that has the
/// wrong shape is a [`DecodeError::Item`] in its own slot.
#[derive(Debug)]
pub struct InboundEvent {
    pub kind: EventKind,
    pub messages: Vec<Result<Message, DecodeError>>,
}

/// Decode a raw feed payload.
///
/// Events of kinds the relay does not act on decode to
/// [`EventKind::Other`] with no messages, whatever their payload looks like.
///
/// # Errors
///
/// Fails only when the envelope itself is unusable: not an object, no
/// `type`, or a `message` that is not an array.
///
/// # Examples
///
/// ```
/// use alertfold::{EventKind, decode};
/// use serde_json::json;
///
/// let event = decode(&json!({
///     "type": "donation",
///     "message": [{"_id": "d1", "name": "ada", "amount": "5.00", "currency": "EUR"}],
/// }))
/// .unwrap();
/// assert_eq!(event.kind, EventKind::Donation);
/// let message = event.messages[0].as_ref().unwrap();
/// assert_eq!(message.id.as_deref(), Some("d1"));
/// ```
pub fn decode(raw: &Value) -> Result<InboundEvent, DecodeError> {
    let envelope = RawEnvelope::deserialize(raw).map_err(DecodeError::Envelope)?;
    let kind = EventKind::from_tag(&envelope.kind);

    if !kind.is_monetary() {
        return Ok(InboundEvent {
            kind,
            messages: Vec::new(),
        });
    }

    let Value::Array(items) = envelope.message else {
        return Err(DecodeError::MessageNotArray {
            kind: envelope.kind,
        });
    };

    let messages = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<RawMessage>(item)
                .map(Message::from)
                .map_err(|source| DecodeError::Item { index, source })
        })
        .collect();

    Ok(InboundEvent { kind, messages })
}
