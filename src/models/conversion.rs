// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use std::fmt;

use super::currencies::is_supported;

/// Query for the conversion endpoint. `None` omits the parameter entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionRequest {
    pub currency: Option<String>,
    pub value: Option<String>,
}

impl ConversionRequest {
    pub fn new(currency: impl Into<String>, value: impl ToString) -> Self {
        Self {
            currency: Some(currency.into()),
            value: Some(value.to_string()),
        }
    }

    pub fn without_currency(value: impl ToString) -> Self {
        Self {
            currency: None,
            value: Some(value.to_string()),
        }
    }

    pub fn without_value(currency: impl Into<String>) -> Self {
        Self {
            currency: Some(currency.into()),
            value: None,
        }
    }

    pub fn query(&self) -> Vec<(&'static str, &str)> {
        let mut query = Vec::with_capacity(2);
        if let Some(currency) = &self.currency {
            query.push(("currency", currency.as_str()));
        }
        if let Some(value) = &self.value {
            query.push(("value", value.as_str()));
        }
        query
    }

    /// Predicts the server's answer. The currency parameter is validated
    /// before the value.
    pub fn expected_outcome(&self, supported: &[String], max_digits: usize) -> ExpectedOutcome {
        match self.currency.as_deref() {
            None => return ExpectedOutcome::Rejected(ExpectedError::MissingCurrency),
            Some(code) if !is_supported(code, supported) => {
                return ExpectedOutcome::Rejected(ExpectedError::UnsupportedSymbol)
            }
            Some(_) => {}
        }
        match self.value.as_deref().map(|v| classify_value(v, max_digits)) {
            None => ExpectedOutcome::Rejected(ExpectedError::MissingValue),
            Some(ValueClass::Numeric(amount)) => ExpectedOutcome::Converted { amount },
            Some(ValueClass::NonNumeric) | Some(ValueClass::OutOfRange) => {
                ExpectedOutcome::Rejected(ExpectedError::InvalidValue)
            }
        }
    }
}

impl fmt::Display for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let query = self
            .query()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        write!(f, "?{}", query)
    }
}

/// Validation errors the conversion endpoint reports with HTTP 500.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedError {
    MissingCurrency,
    UnsupportedSymbol,
    MissingValue,
    InvalidValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpectedOutcome {
    Converted { amount: f64 },
    Rejected(ExpectedError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueClass {
    Numeric(f64),
    NonNumeric,
    /// Numeric, but with more digits than the server accepts.
    OutOfRange,
}

/// Classifies a `value` parameter as the conversion endpoint would.
///
/// Accepts plain decimals with an optional sign (`20000`, `-1.5`, `.25`);
/// exponents, `inf` and `NaN` are non-numeric. Every digit counts toward
/// `max_digits`.
pub fn classify_value(value: &str, max_digits: usize) -> ValueClass {
    let unsigned = value.strip_prefix(&['-', '+'][..]).unwrap_or(value);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (unsigned, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return ValueClass::NonNumeric;
    }
    let digits = int_part.len() + frac_part.len();
    if digits == 0 {
        return ValueClass::NonNumeric;
    }
    if digits > max_digits {
        return ValueClass::OutOfRange;
    }

    match value.parse::<f64>() {
        Ok(amount) if amount.is_finite() => ValueClass::Numeric(amount),
        _ => ValueClass::NonNumeric,
    }
}
