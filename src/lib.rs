#[macro_use]
extern crate prometheus;

pub mod config;

pub mod cmd;

pub use cmd::Command;

mod connection;

pub use connection::Connection;

pub mod frame;

pub use frame::Frame;

mod db;

pub use db::{Db, KeyExpiry, KeyMetadata};

mod parse;

use parse::{Parse, ParseError};

pub mod server;

pub mod eviction;
pub mod metrics;
pub mod sweeper;
mod shutdown;
pub mod utils;

use shutdown::Shutdown;

/// Default port that a cachette server listens on.
///
/// Used if no port is specified.
pub const DEFAULT_PORT: u16 = 7379;

/// Error returned by most functions.
///
/// This is transport plumbing; errors that a client is meant to see
/// travel as `Frame::Error` values instead and never pass through
/// here. The hot parsing paths define dedicated error `enum`s
/// (`frame::FrameError`, `parse::ParseError`) which convert into
/// this boxed form at the connection boundary.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for cachette operations.
///
/// This is defined as a convenience.
pub type Result<T> = std::result::Result<T, Error>;
