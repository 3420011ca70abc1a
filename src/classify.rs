use crate::event::{DecodeError, EventKind, Message};
use crate::plans::{self, PLAN_CURRENCY, Plan};
use log::warn;
use serde_json::Value;

/// Bits per currency unit for cheers.
pub const BITS_PER_UNIT: f64 = 100.0;

/// A classified alert ready to be folded into the running total.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    Cheer {
        name: String,
        bits: i64,
    },
    Donation {
        name: String,
        amount: f64,
        currency: String,
    },
    Subscription {
        name: String,
        months: u32,
        plan: &'static Plan,
    },
}

impl Alert {
    /// Monetary value before currency conversion, in [`Alert::currency`].
    ///
    /// Cheers are worth one unit per [`BITS_PER_UNIT`] bits.
    pub fn amount(&self) -> f64 {
        match self {
            Alert::Cheer { bits, .. } => *bits as f64 / BITS_PER_UNIT,
            Alert::Donation { amount, .. } => *amount,
            Alert::Subscription { plan, .. } => plan.amount,
        }
    }

    /// Currency of [`Alert::amount`].
    pub fn currency(&self) -> &str {
        match self {
            Alert::Donation { currency, .. } => currency,
            Alert::Cheer { .. } | Alert::Subscription { .. } => PLAN_CURRENCY,
        }
    }

    /// Display name of the sender.
    pub fn name(&self) -> &str {
        match self {
            Alert::Cheer { name, .. }
            | Alert::Donation { name, .. }
            | Alert::Subscription { name, .. } => name,
        }
    }
}

/// Extract the alert carried by `message` for an event of `kind`.
///
/// Returns `Ok(None)` for kinds the relay ignores and for subscriptions to
/// an unknown plan (logged as a warning).
///
/// # Examples
///
/// ```
/// use alertfold::{Alert, EventKind, Message, classify};
/// use serde_json::json;
///
/// let mut message = Message::with_id("a");
/// message.amount = Some(json!("500"));
///
/// let alert = classify(&EventKind::Bits, &message).unwrap().unwrap();
/// assert_eq!(alert.amount(), 5.0);
/// ```
pub fn classify(kind: &EventKind, message: &Message) -> Result<Option<Alert>, DecodeError> {
    match kind {
        EventKind::Bits => {
            let raw = message
                .amount
                .as_ref()
                .ok_or(DecodeError::MissingAmount { kind: "cheer" })?;
            Ok(Some(Alert::Cheer {
                name: message.name.clone(),
                bits: parse_int(raw).ok_or_else(|| invalid("cheer", raw))?,
            }))
        }
        EventKind::Donation => {
            let raw = message
                .amount
                .as_ref()
                .ok_or(DecodeError::MissingAmount { kind: "donation" })?;
            let amount = parse_float(raw).ok_or_else(|| invalid("donation", raw))?;
            let currency = message
                .currency
                .clone()
                .ok_or(DecodeError::MissingCurrency)?;
            Ok(Some(Alert::Donation {
                name: message.name.clone(),
                amount,
                currency,
            }))
        }
        EventKind::Subscription | EventKind::Resub => {
            let plan_id = message.sub_plan.as_deref().unwrap_or_default();
            let Some(plan) = plans::find(plan_id) else {
                warn!(
                    "Subscription plan \"{plan_id}\" not found (from {}, id {:?})",
                    message.name, message.id
                );
                return Ok(None);
            };
            Ok(Some(Alert::Subscription {
                name: message.name.clone(),
                months: message.months.unwrap_or(1),
                plan,
            }))
        }
        EventKind::Other(_) => Ok(None),
    }
}

fn invalid(kind: &'static str, raw: &Value) -> DecodeError {
    DecodeError::InvalidAmount {
        kind,
        value: raw.to_string(),
    }
}

/// Base-10 integer read the way `parseInt` does: leading whitespace, an
/// optional sign, then as many digits as there are. Negative counts are
/// rejected; the total only grows.
fn parse_int(raw: &Value) -> Option<i64> {
    let value = match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => {
            let s = s.trim_start();
            let (negative, digits) = match s.as_bytes().first() {
                Some(b'-') => (true, &s[1..]),
                Some(b'+') => (false, &s[1..]),
                _ => (false, s),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            let value: i64 = digits[..end].parse().ok()?;
            Some(if negative { -value } else { value })
        }
        _ => None,
    }?;
    (value >= 0).then_some(value)
}

fn parse_float(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (value.is_finite() && value >= 0.0).then_some(value)
}
