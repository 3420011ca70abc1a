//! Exchange rate tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RatesError {
    #[error("failed to fetch exchange rates from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("exchange rates from {url} are based on {got}, expected {expected}")]
    WrongBase {
        url: String,
        expected: String,
        got: String,
    },
}

/// Units of each currency per one unit of `base`.
///
/// # Examples
///
/// ```
/// use alertfold::RateTable;
///
/// let table = RateTable::new("EUR", [("USD", 1.25)]);
/// assert_eq!(table.rate("USD"), Some(1.25));
/// assert_eq!(table.rate("EUR"), Some(1.0));
/// assert_eq!(table.rate("JPY"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub base: String,
    #[serde(default)]
    pub rates: HashMap<String, f64>,
}

impl RateTable {
    pub fn new<I, K>(base: impl Into<String>, rates: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        RateTable {
            base: base.into(),
            rates: rates.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Rate for `currency`, if it is usable as a divisor.
    ///
    /// The base currency is worth exactly one of itself even when the table
    /// does not list it.
    pub fn rate(&self, currency: &str) -> Option<f64> {
        match self.rates.get(currency) {
            Some(rate) => Some(*rate).filter(|r| r.is_finite() && *r > 0.0),
            None if currency == self.base => Some(1.0),
            None => None,
        }
    }

    /// Fetch a table based on `base` from an exchangeratesapi-style
    /// endpoint (`GET <url>?base=<base>` answering `{"base", "rates"}`).
    ///
    /// Blocking; call it before starting any async runtime.
    pub fn fetch(url: &str, base: &str) -> Result<Self, RatesError> {
        let fetch_err = |source| RatesError::Fetch {
            url: url.to_string(),
            source,
        };

        let table: RateTable = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(fetch_err)?
            .get(url)
            .query(&[("base", base)])
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(fetch_err)?
            .json()
            .map_err(fetch_err)?;

        if table.base != base {
            return Err(RatesError::WrongBase {
                url: url.to_string(),
                expected: base.to_string(),
                got: table.base,
            });
        }
        Ok(table)
    }
}
