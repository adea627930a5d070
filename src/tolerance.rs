// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use approx::{abs_diff_eq, relative_eq};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checks::CheckFailure;

/// Acceptance band for comparing a received conversion with the one
/// calculated from the ticker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tolerance {
    /// `|received - calculated| <= bound`
    Absolute(f64),
    /// `|received - calculated| <= bound * max(|received|, |calculated|)`
    Relative(f64),
}

impl Tolerance {
    pub fn bound(&self) -> f64 {
        match self {
            Tolerance::Absolute(b) | Tolerance::Relative(b) => *b,
        }
    }

    pub fn is_valid(&self) -> bool {
        let b = self.bound();
        b.is_finite() && b > 0.0
    }

    pub fn accepts(&self, received: f64, calculated: f64) -> bool {
        if !received.is_finite() || !calculated.is_finite() {
            return false;
        }
        match *self {
            Tolerance::Absolute(bound) => abs_diff_eq!(received, calculated, epsilon = bound),
            Tolerance::Relative(bound) => {
                relative_eq!(received, calculated, epsilon = 0.0, max_relative = bound)
            }
        }
    }

    /// Fails with the computed delta when `received` falls outside the band.
    pub fn check(&self, received: f64, calculated: f64) -> Result<(), CheckFailure> {
        if self.accepts(received, calculated) {
            return Ok(());
        }
        Err(CheckFailure::Tolerance {
            received,
            calculated,
            delta: (received - calculated).abs(),
            tolerance: *self,
        })
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tolerance::Absolute(b) => write!(f, "±{}", b),
            Tolerance::Relative(b) => write!(f, "±{}%", b * 100.0),
        }
    }
}
