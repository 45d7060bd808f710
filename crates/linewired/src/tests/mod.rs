//! Test suites for the linewire daemon.

mod support;
