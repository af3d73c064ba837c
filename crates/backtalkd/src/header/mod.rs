//! Handshake header grammar.
//!
//! Every connection opens with a single line of the form
//!
//! ```text
//! backtalk/<major>.<minor> <service> <serviceVersion>[ (<options>)]
//! ```
//!
//! [`Header::parse`] is total: any input yields either a [`Header`] or exactly
//! one [`HeaderError`], and checks stop at the first failing token. Tokens
//! after the option list are ignored.

mod errors;
mod parser;
mod types;

pub use self::errors::HeaderError;
pub use self::types::{
    Header, HeaderOption, PRESENT_VALUE, PROTOCOL_NAME, ProtocolVersion, Qualifier,
    ServiceVersion,
};
