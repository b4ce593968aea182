//! Types stored in or derived from the visitor session.

pub mod session;
