// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use crate::checks::CheckFailure;

/// Builds a numeric literal of `count` copies of `digit`, e.g. `999`.
pub fn repeat_digit(digit: char, count: usize) -> String {
    std::iter::repeat(digit).take(count).collect()
}

/// Parses the plain-text body of a successful conversion.
///
/// The endpoint answers with a bare number, occasionally with thousands
/// separators or in scientific notation for very large amounts.
pub fn parse_btc_amount(body: &str) -> Result<f64, CheckFailure> {
    let not_numeric = || CheckFailure::NotNumeric {
        body: body.to_string(),
    };
    let cleaned = strip_thousands_separators(body.trim()).ok_or_else(not_numeric)?;
    match cleaned.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(not_numeric()),
    }
}

/// Removes commas that group the integer part in threes (`1,234,567.5`).
/// Any other comma, such as a decimal comma in `0,002`, is rejected.
fn strip_thousands_separators(number: &str) -> Option<String> {
    if !number.contains(',') {
        return Some(number.to_string());
    }
    let int_end = number
        .find(|c: char| c == '.' || c == 'e' || c == 'E')
        .unwrap_or(number.len());
    let (int_part, rest) = number.split_at(int_end);
    if rest.contains(',') {
        return None;
    }

    let unsigned = int_part.strip_prefix(&['-', '+'][..]).unwrap_or(int_part);
    let mut groups = unsigned.split(',');
    let lead = groups.next()?;
    if lead.is_empty() || lead.len() > 3 || lead.starts_with('0') {
        return None;
    }
    if !groups.all(|g| g.len() == 3) {
        return None;
    }
    Some(number.replace(',', ""))
}
