//! Test suites for the supervisor daemon.

mod support;
