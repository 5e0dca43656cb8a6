//! Operations behind the CLI commands, kept free of terminal concerns so
//! they can be driven with fake sources in tests.

pub mod fetch;
