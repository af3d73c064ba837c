//! Test suites for the backtalk daemon.

pub(crate) mod support;
