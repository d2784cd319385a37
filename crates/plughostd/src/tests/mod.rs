//! Test suites for the plugin host daemon.
