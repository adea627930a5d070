// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use std::collections::BTreeSet;

/// Currency codes the ticker advertises.
pub const SUPPORTED_CURRENCIES: [&str; 22] = [
    "USD", "JPY", "CNY", "SGD", "HKD", "CAD", "NZD", "AUD", "CLP", "GBP", "DKK", "SEK", "ISK",
    "BRL", "EUR", "RUB", "PLN", "THB", "KRW", "TWD", "CHF", "INR",
];

/// Difference between the expected currency set and what the server sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrencySetDiff {
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

impl CurrencySetDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Order-independent comparison of two currency key sets.
pub fn diff_currency_sets<E, A>(expected: E, actual: A) -> CurrencySetDiff
where
    E: IntoIterator,
    E::Item: AsRef<str>,
    A: IntoIterator,
    A::Item: AsRef<str>,
{
    let expected: BTreeSet<String> = expected.into_iter().map(|c| c.as_ref().to_string()).collect();
    let actual: BTreeSet<String> = actual.into_iter().map(|c| c.as_ref().to_string()).collect();

    CurrencySetDiff {
        missing: expected.difference(&actual).cloned().collect(),
        unexpected: actual.difference(&expected).cloned().collect(),
    }
}

pub fn is_supported(code: &str, supported: &[String]) -> bool {
    supported.iter().any(|c| c == code)
}
