mod common;

use alertfold::{Alert, DecodeError, DedupFilter, EventKind, Message, classify, decode, plans};
use common::{bits_event, donation_event, subscription_event};
use serde_json::json;

fn only_message(raw: &serde_json::Value) -> (EventKind, Message) {
    let event = decode(raw).unwrap();
    assert_eq!(event.messages.len(), 1);
    (event.kind, event.messages.into_iter().next().unwrap().unwrap())
}

// --- decode ---

#[test]
fn test_decode_kinds() {
    assert_eq!(decode(&bits_event("a", "1")).unwrap().kind, EventKind::Bits);
    assert_eq!(
        decode(&donation_event("b", "1", "USD")).unwrap().kind,
        EventKind::Donation
    );
    assert_eq!(
        decode(&subscription_event("c", "1000", 1)).unwrap().kind,
        EventKind::Subscription
    );
    let resub = json!({"type": "resub", "message": [{"_id": "d", "subPlan": "1000"}]});
    assert_eq!(decode(&resub).unwrap().kind, EventKind::Resub);
}

#[test]
fn test_decode_unknown_type_is_ignored_whatever_the_payload() {
    let raw = json!({"type": "follow", "message": {"name": "someone"}});
    let event = decode(&raw).unwrap();
    assert_eq!(event.kind, EventKind::Other("follow".into()));
    assert!(event.messages.is_empty());
}

#[test]
fn test_decode_rejects_bad_envelopes() {
    assert!(matches!(decode(&json!("bits")), Err(DecodeError::Envelope(_))));
    assert!(matches!(
        decode(&json!({"message": []})),
        Err(DecodeError::Envelope(_))
    ));
    assert!(matches!(
        decode(&json!({"type": "donation", "message": {"amount": 1}})),
        Err(DecodeError::MessageNotArray { .. })
    ));
    assert!(matches!(
        decode(&json!({"type": "donation"})),
        Err(DecodeError::MessageNotArray { .. })
    ));
}

#[test]
fn test_decode_keeps_malformed_items_separate() {
    let raw = json!({"type": "donation", "message": [
        {"_id": "good", "amount": "5", "currency": "EUR"},
        {"_id": "bad", "name": 42, "amount": "5", "currency": "EUR"},
        42,
        {"_id": "also-good", "amount": "1", "currency": "EUR"},
    ]});

    let event = decode(&raw).unwrap();
    assert_eq!(event.messages.len(), 4);
    assert_eq!(event.messages[0].as_ref().unwrap().id.as_deref(), Some("good"));
    assert!(matches!(event.messages[1], Err(DecodeError::Item { index: 1, .. })));
    assert!(matches!(event.messages[2], Err(DecodeError::Item { index: 2, .. })));
    assert_eq!(
        event.messages[3].as_ref().unwrap().id.as_deref(),
        Some("also-good")
    );
}

#[test]
fn test_decode_accepts_both_key_spellings() {
    let camel = json!({"type": "subscription", "message": [
        {"_id": "x", "subPlan": "2000", "isTest": true, "forceRepeat": true, "months": "4"}
    ]});
    let snake = json!({"type": "subscription", "message": [
        {"_id": "x", "sub_plan": "2000", "is_test": true, "force_repeat": true, "months": 4}
    ]});

    let (_, camel) = only_message(&camel);
    let (_, snake) = only_message(&snake);
    assert_eq!(camel, snake);
    assert_eq!(camel.sub_plan.as_deref(), Some("2000"));
    assert!(camel.is_test);
    assert!(camel.force_repeat);
    assert_eq!(camel.months, Some(4));
}

#[test]
fn test_decode_prefers_underscore_id() {
    let raw = json!({"type": "donation", "message": [
        {"id": 1234, "_id": "abc", "amount": "1", "currency": "USD"},
        {"id": 5678, "amount": "1", "currency": "USD"},
        {"amount": "1", "currency": "USD"},
    ]});
    let event = decode(&raw).unwrap();
    let ids: Vec<_> = event
        .messages
        .iter()
        .map(|m| m.as_ref().unwrap().id.as_deref())
        .collect();
    assert_eq!(ids, vec![Some("abc"), Some("5678"), None]);
}

#[test]
fn test_decode_tolerates_nulls() {
    let raw = json!({"type": "bits", "message": [
        {"id": "n", "name": null, "amount": "100", "isTest": null, "repeat": null}
    ]});
    let (_, message) = only_message(&raw);
    assert_eq!(message.name, "");
    assert!(!message.is_test);
    assert!(!message.repeat);
}

// --- classify ---

#[test]
fn test_cheer_amount_is_bits_over_hundred() {
    let (kind, message) =
        only_message(&json!({"type": "bits", "message": [{"id": "a", "amount": "500"}]}));

    let alert = classify(&kind, &message).unwrap().unwrap();
    assert_eq!(alert, Alert::Cheer { name: String::new(), bits: 500 });
    assert_eq!(alert.amount(), 5.0);
    assert_eq!(alert.currency(), "USD");
}

#[test]
fn test_subscription_plan_lookup() {
    let (kind, message) = only_message(&json!({
        "type": "subscription",
        "message": [{"id": "b", "subPlan": "2000", "months": 3}]
    }));

    let alert = classify(&kind, &message).unwrap().unwrap();
    assert_eq!(alert.amount(), 9.99);
    assert_eq!(alert.currency(), "USD");
    match alert {
        Alert::Subscription { months, plan, .. } => {
            assert_eq!(months, 3);
            assert_eq!(plan.name, "Tier 2 Subscription");
        }
        other => panic!("expected a subscription, got {other:?}"),
    }
}

#[test]
fn test_every_plan_is_known() {
    for (id, amount) in [("Prime", 4.99), ("1000", 4.99), ("2000", 9.99), ("3000", 24.99)] {
        assert_eq!(plans::find(id).unwrap().amount, amount);
    }
}

#[test]
fn test_unknown_plan_is_dropped() {
    let (kind, message) = only_message(&subscription_event("c", "9999", 1));
    assert_eq!(classify(&kind, &message).unwrap(), None);

    let (kind, message) = only_message(&json!({"type": "resub", "message": [{"_id": "d"}]}));
    assert_eq!(classify(&kind, &message).unwrap(), None);
}

#[test]
fn test_subscription_months_default_to_one() {
    let (kind, message) =
        only_message(&json!({"type": "resub", "message": [{"_id": "e", "subPlan": "Prime"}]}));
    match classify(&kind, &message).unwrap().unwrap() {
        Alert::Subscription { months, .. } => assert_eq!(months, 1),
        other => panic!("expected a subscription, got {other:?}"),
    }
}

#[test]
fn test_donation_keeps_currency() {
    let (kind, message) = only_message(&donation_event("f", "12.34", "GBP"));
    let alert = classify(&kind, &message).unwrap().unwrap();
    assert_eq!(alert.amount(), 12.34);
    assert_eq!(alert.currency(), "GBP");
    assert_eq!(alert.name(), "donor");
}

#[test]
fn test_bad_amounts_are_decode_errors() {
    let (kind, message) = only_message(&bits_event("g", "lots"));
    assert!(matches!(
        classify(&kind, &message),
        Err(DecodeError::InvalidAmount { kind: "cheer", .. })
    ));

    let (kind, message) = only_message(&donation_event("h", "ten", "USD"));
    assert!(matches!(
        classify(&kind, &message),
        Err(DecodeError::InvalidAmount { kind: "donation", .. })
    ));

    let (kind, message) =
        only_message(&json!({"type": "donation", "message": [{"_id": "i", "amount": "5"}]}));
    assert!(matches!(classify(&kind, &message), Err(DecodeError::MissingCurrency)));

    let (kind, message) = only_message(&bits_event("k", "-500"));
    assert!(matches!(
        classify(&kind, &message),
        Err(DecodeError::InvalidAmount { kind: "cheer", .. })
    ));

    let (kind, message) = only_message(&donation_event("l", "-3", "EUR"));
    assert!(matches!(
        classify(&kind, &message),
        Err(DecodeError::InvalidAmount { kind: "donation", .. })
    ));

    let (kind, message) = only_message(&json!({"type": "bits", "message": [{"id": "j"}]}));
    assert!(matches!(classify(&kind, &message), Err(DecodeError::MissingAmount { .. })));
}

// --- dedup ---

#[test]
fn test_dedup_rejects_resubmission() {
    let mut filter = DedupFilter::new();
    let message = Message::with_id("m1");

    assert!(filter.should_handle(&message));
    assert!(!filter.should_handle(&message));
    assert!(!filter.should_handle(&message));
    assert_eq!(filter.seen_count(), 1);
}

#[test]
fn test_dedup_remembers_rejected_test_alerts() {
    let mut filter = DedupFilter::new();
    let mut message = Message::with_id("t1");
    message.is_test = true;

    assert!(!filter.should_handle(&message));
    assert!(filter.has_seen("t1"));

    // Even without the flag, the same id stays rejected.
    message.is_test = false;
    assert!(!filter.should_handle(&message));
}

#[test]
fn test_dedup_test_alerts_can_be_included() {
    let mut filter = DedupFilter::new().include_test_alerts(true);
    let mut message = Message::with_id("t2");
    message.is_test = true;

    assert!(filter.should_handle(&message));
}

#[test]
fn test_dedup_rejects_repeats_unless_included() {
    let mut repeat = Message::with_id("r1");
    repeat.repeat = true;
    let mut forced = Message::with_id("r2");
    forced.force_repeat = true;

    let mut strict = DedupFilter::new();
    assert!(!strict.should_handle(&repeat));
    assert!(!strict.should_handle(&forced));

    let mut lenient = DedupFilter::new().include_repeat_alerts(true);
    assert!(lenient.should_handle(&repeat));
    assert!(lenient.should_handle(&forced));
}

#[test]
fn test_dedup_messages_without_id_are_never_duplicates() {
    let mut filter = DedupFilter::new();
    let message = Message::default();

    assert!(filter.should_handle(&message));
    assert!(filter.should_handle(&message));
    assert_eq!(filter.seen_count(), 0);
}
