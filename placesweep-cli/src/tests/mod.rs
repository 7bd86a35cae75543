//! Shared test harness modules for the placesweep CLI.

use super::*;

mod helpers;
mod unit;
