// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

//! Contract tests for the blockchain.info ticker and `tobtc` conversion API.

pub mod api;
pub mod checks;
pub mod config;
pub mod models;
pub mod report;
pub mod suite;
pub mod tolerance;
pub mod utils;
