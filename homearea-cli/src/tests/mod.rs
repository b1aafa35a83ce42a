//! Shared test harness modules for the homearea CLI.

use super::*;

mod helpers;
