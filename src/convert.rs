use crate::rates::RateTable;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConvertError {
    #[error("no exchange rate from {from} to {to}")]
    UnknownCurrency { from: String, to: String },
}

/// Normalizes amounts into the configured target currency.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    target: Option<String>,
    rates: RateTable,
}

impl Converter {
    /// Convert into `target` using `rates`, which must be based on `target`.
    pub fn new(target: impl Into<String>, rates: RateTable) -> Self {
        Converter {
            target: Some(target.into()),
            rates,
        }
    }

    /// A converter that leaves every amount unchanged.
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// The configured target currency, if any.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Convert `amount` of `from` into the target currency.
    ///
    /// Plain floating-point division by the rate; no rounding is applied.
    ///
    /// # Examples
    ///
    /// ```
    /// use alertfold::{Converter, RateTable};
    ///
    /// let converter = Converter::new("EUR", RateTable::new("EUR", [("USD", 1.25)]));
    /// assert_eq!(converter.convert(10.0, "USD").unwrap(), 8.0);
    /// assert_eq!(Converter::passthrough().convert(10.0, "USD").unwrap(), 10.0);
    /// ```
    pub fn convert(&self, amount: f64, from: &str) -> Result<f64, ConvertError> {
        let Some(target) = &self.target else {
            return Ok(amount);
        };

        let rate = self
            .rates
            .rate(from)
            .ok_or_else(|| ConvertError::UnknownCurrency {
                from: from.to_string(),
                to: target.clone(),
            })?;
        Ok(amount / rate)
    }
}
