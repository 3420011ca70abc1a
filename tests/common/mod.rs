#![allow(dead_code)]

use alertfold::{Converter, DedupFilter, RateTable, Renderer, Session, StateStore};
use serde_json::{Value, json};
use std::path::Path;

pub fn bits_event(id: &str, amount: &str) -> Value {
    json!({
        "type": "bits",
        "for": "twitch_account",
        "message": [{"id": id, "name": "cheerer", "amount": amount}],
    })
}

pub fn donation_event(id: &str, amount: &str, currency: &str) -> Value {
    json!({
        "type": "donation",
        "message": [{"_id": id, "name": "donor", "amount": amount, "currency": currency}],
    })
}

pub fn subscription_event(id: &str, plan: &str, months: u32) -> Value {
    json!({
        "type": "subscription",
        "for": "twitch_account",
        "message": [{"_id": id, "name": "subscriber", "subPlan": plan, "months": months}],
    })
}

/// Rates based on EUR: 1 EUR = 1.25 USD = 0.8 GBP.
pub fn eur_rates() -> RateTable {
    RateTable::new("EUR", [("USD", 1.25), ("GBP", 0.8)])
}

pub fn total_template() -> Vec<(&'static str, &'static str)> {
    vec![("total.txt", "{{ state.total | fixed(2) }}")]
}

/// A session over `dir/state.json` rendering into `dir/files`.
pub fn session_in(dir: &Path, converter: Converter) -> Session {
    let store = StateStore::open(dir.join("state.json"), json!({"total": 0})).unwrap();
    let renderer = Renderer::compile(dir.join("files"), total_template()).unwrap();
    Session::new(store, renderer, DedupFilter::new(), converter)
}

pub fn total(session: &Session) -> f64 {
    session.store().get("total").and_then(Value::as_f64).unwrap()
}

pub fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}
