use crate::cmd::{CommandError, Invalid};
use crate::utils::{resp_bulk, resp_err, resp_str};
use crate::{Frame, Parse, ParseError};

use bytes::Bytes;

/// Returns PONG if no argument is provided, otherwise a bulk-string
/// echo of the argument.
///
/// This command is often used to test if a connection is still alive,
/// or to measure latency.
#[derive(Debug, Clone, Default)]
pub struct Ping {
    /// optional message to be returned
    msg: Option<Bytes>,

    error: Option<CommandError>,
}

impl Ping {
    /// Create a new `Ping` command with optional `msg`.
    pub fn new(msg: Option<Bytes>) -> Ping {
        Ping { msg, error: None }
    }

    /// Parse a `Ping` instance from a received frame.
    ///
    /// The `PING` string has already been consumed; zero or one
    /// arguments may follow.
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Ping, CommandError> {
        let msg = match parse.next_bytes() {
            Ok(msg) => Some(msg),
            Err(ParseError::EndOfStream) => None,
            Err(_) => return Err(CommandError::Syntax),
        };
        if !parse.check_finish() {
            return Err(CommandError::WrongNumberOfArguments("ping"));
        }

        Ok(Ping::new(msg))
    }

    /// Apply the `Ping` command; no state is touched.
    pub(crate) fn ping(&self) -> Frame {
        if let Some(err) = &self.error {
            return resp_err(err.to_string());
        }
        match &self.msg {
            None => resp_str("PONG"),
            Some(msg) => resp_bulk(msg.clone()),
        }
    }
}

impl Invalid for Ping {
    fn new_invalid(error: CommandError) -> Ping {
        Ping {
            msg: None,
            error: Some(error),
        }
    }
}
