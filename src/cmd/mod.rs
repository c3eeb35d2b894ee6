mod get;
pub use get::Get;

mod set;
pub use set::Set;

mod ping;
pub use ping::Ping;

mod del;
pub use del::Del;

mod ttl;
pub use ttl::TTL;

mod expire;
pub use expire::Expire;

mod unknown;
pub use unknown::Unknown;

use crate::config::LOGGER;
use crate::metrics::REQUEST_CMD_ERROR_COUNTER;
use crate::{Connection, Db, Frame, Parse, ParseError};

use slog::debug;
use thiserror::Error;

/// A client-visible command failure.
///
/// The `Display` form of each variant is the exact text placed in
/// the simple-error frame sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(&'static str),

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR value is not an integer or out of range")]
    ValueNotInteger,

    #[error("ERR unknown command '{cmd}', with args beginning with: {args}")]
    UnknownCommand { cmd: String, args: String },
}

/// Enumeration of supported commands.
///
/// Methods called on `Command` are delegated to the command
/// implementation.
#[derive(Debug)]
pub enum Command {
    Get(Get),
    Set(Set),
    Ping(Ping),
    Del(Del),
    TTL(TTL),
    Expire(Expire),
    Unknown(Unknown),
}

impl Command {
    /// Parse a command from a received frame.
    ///
    /// The `Frame` must be the array variant; anything else is a
    /// protocol violation and an error here terminates the
    /// connection. Argument-level failures (arity, syntax, integer
    /// range) do not error: they parse into a command that answers
    /// with the corresponding error frame.
    pub fn from_frame(frame: Frame) -> crate::Result<Command> {
        // The frame value is decorated with `Parse`, which provides
        // a "cursor" like API making the command easier to parse.
        let mut parse = Parse::new(frame)?;

        // All commands begin with the command name as a string. The
        // name is matched case-folded; the original spelling is kept
        // for the unknown-command reply.
        let command_name = parse.next_string()?;

        let command = match command_name.to_lowercase().as_str() {
            "ping" => Command::Ping(transform_parse(Ping::parse_frames(&mut parse))),
            "get" => Command::Get(transform_parse(Get::parse_frames(&mut parse))),
            "set" => Command::Set(transform_parse(Set::parse_frames(&mut parse))),
            "del" => Command::Del(transform_parse(Del::parse_frames(&mut parse))),
            "ttl" => Command::TTL(transform_parse(TTL::parse_frames(&mut parse))),
            "expire" => Command::Expire(transform_parse(Expire::parse_frames(&mut parse))),
            _ => {
                let mut args = Vec::new();
                while let Ok(arg) = parse.next_string() {
                    args.push(arg);
                }
                return Ok(Command::Unknown(Unknown::new(command_name, args)));
            }
        };

        Ok(command)
    }

    /// Apply the command to the specified `Db` instance, writing the
    /// response to `dst`.
    ///
    /// Handlers produce a response frame from their arguments and
    /// the keyspace; errors they report are already encoded as
    /// simple-error frames by the time they reach the wire.
    pub(crate) async fn apply(&self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        use Command::*;

        let response = match self {
            Ping(cmd) => cmd.ping(),
            Get(cmd) => cmd.get(db),
            Set(cmd) => cmd.set(db),
            Del(cmd) => cmd.del(db),
            TTL(cmd) => cmd.ttl(db),
            Expire(cmd) => cmd.expire(db),
            Unknown(cmd) => cmd.reply(),
        };

        debug!(LOGGER, "res, {:?}", response);

        if let Frame::Error(_) = response {
            REQUEST_CMD_ERROR_COUNTER
                .with_label_values(&[self.get_name()])
                .inc();
        }

        dst.write_frame(&response).await?;

        Ok(())
    }

    /// Returns the command name
    pub(crate) fn get_name(&self) -> &str {
        match self {
            Command::Get(_) => "get",
            Command::Set(_) => "set",
            Command::Ping(_) => "ping",
            Command::Del(_) => "del",
            Command::TTL(_) => "ttl",
            Command::Expire(_) => "expire",
            Command::Unknown(cmd) => cmd.get_name(),
        }
    }
}

/// All commands implement `new_invalid` so that argument-level parse
/// failures become commands that answer with the failure instead of
/// tearing down the connection.
pub trait Invalid {
    fn new_invalid(error: CommandError) -> Self;
}

fn transform_parse<T: Invalid>(parse_res: Result<T, CommandError>) -> T {
    match parse_res {
        Ok(cmd) => cmd,
        Err(err) => T::new_invalid(err),
    }
}

/// Maps a cursor failure while reading required arguments onto the
/// command's own arity error.
pub(crate) fn arity_error(cmd: &'static str, err: ParseError) -> CommandError {
    match err {
        ParseError::EndOfStream => CommandError::WrongNumberOfArguments(cmd),
        ParseError::Other(_) => CommandError::Syntax,
    }
}

/// Quotes arguments the way the unknown-command reply expects:
/// `'a' 'b' 'c'`, or an empty string for no arguments.
pub(crate) fn format_command_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| format!("'{}'", arg))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::SampledLruEvict;
    use crate::sweeper::SampleSweepExpiry;
    use crate::utils::ExpiryTime;
    use bytes::Bytes;

    fn test_db() -> Db {
        Db::with_strategies(
            100,
            Box::new(SampledLruEvict::new(5)),
            Box::new(SampleSweepExpiry::new(20, 0.25)),
        )
    }

    fn command(parts: &[&str]) -> Command {
        let frame = Frame::Array(
            parts
                .iter()
                .map(|p| Frame::Bulk(Bytes::copy_from_slice(p.as_bytes())))
                .collect(),
        );
        Command::from_frame(frame).unwrap()
    }

    fn exec(cmd: &Command, db: &Db) -> Frame {
        use Command::*;
        match cmd {
            Ping(c) => c.ping(),
            Get(c) => c.get(db),
            Set(c) => c.set(db),
            Del(c) => c.del(db),
            TTL(c) => c.ttl(db),
            Expire(c) => c.expire(db),
            Unknown(c) => c.reply(),
        }
    }

    #[test]
    fn ping_answers_pong_or_echoes() {
        let db = test_db();
        assert_eq!(exec(&command(&["PING"]), &db), Frame::Simple("PONG".into()));
        assert_eq!(
            exec(&command(&["ping", "hello"]), &db),
            Frame::Bulk(Bytes::from_static(b"hello"))
        );
        assert_eq!(
            exec(&command(&["PING", "a", "b"]), &db),
            Frame::Error("ERR wrong number of arguments for 'ping' command".into())
        );
    }

    #[test]
    fn set_then_get_round_trips() {
        let db = test_db();
        assert_eq!(
            exec(&command(&["SET", "k", "v"]), &db),
            Frame::Simple("OK".into())
        );
        assert_eq!(
            exec(&command(&["GET", "k"]), &db),
            Frame::Bulk(Bytes::from_static(b"v"))
        );
        assert_eq!(exec(&command(&["GET", "missing"]), &db), Frame::Null);
    }

    #[test]
    fn get_arity_is_exactly_one() {
        let db = test_db();
        let wrong = Frame::Error("ERR wrong number of arguments for 'get' command".into());
        assert_eq!(exec(&command(&["GET"]), &db), wrong);
        assert_eq!(exec(&command(&["GET", "a", "b"]), &db), wrong);
    }

    #[test]
    fn set_options_are_validated() {
        let db = test_db();
        let syntax = Frame::Error("ERR syntax error".into());
        // Duplicate expiry option.
        assert_eq!(
            exec(&command(&["SET", "k", "v", "EX", "10", "PX", "10000"]), &db),
            syntax
        );
        // Unknown option token.
        assert_eq!(exec(&command(&["SET", "k", "v", "NX"]), &db), syntax);
        // Missing option argument.
        assert_eq!(exec(&command(&["SET", "k", "v", "EX"]), &db), syntax);
        // Non-integer option argument.
        assert_eq!(
            exec(&command(&["SET", "k", "v", "EX", "ten"]), &db),
            Frame::Error("ERR value is not an integer or out of range".into())
        );
        // Options are case-insensitive.
        assert_eq!(
            exec(&command(&["SET", "k", "v", "ex", "10"]), &db),
            Frame::Simple("OK".into())
        );
    }

    #[test]
    fn set_with_elapsed_expiry_is_gone_on_read() {
        let db = test_db();
        exec(&command(&["SET", "k", "v", "EX", "0"]), &db);
        assert_eq!(exec(&command(&["GET", "k"]), &db), Frame::Null);
        assert_eq!(exec(&command(&["TTL", "k"]), &db), Frame::Integer(-2));
    }

    #[test]
    fn ttl_reports_remaining_or_sentinels() {
        let db = test_db();
        assert_eq!(exec(&command(&["TTL", "missing"]), &db), Frame::Integer(-2));

        exec(&command(&["SET", "k", "v"]), &db);
        assert_eq!(exec(&command(&["TTL", "k"]), &db), Frame::Integer(-1));

        exec(&command(&["SET", "k", "v", "EX", "10"]), &db);
        assert_eq!(exec(&command(&["TTL", "k"]), &db), Frame::Integer(10));

        db.set_expiry("k", Some(ExpiryTime::from_millis(-1000)));
        assert_eq!(exec(&command(&["TTL", "k"]), &db), Frame::Integer(-2));
        // TTL is a pure read: the expired key is still resident.
        assert_eq!(db.key_count(), 1);
    }

    #[test]
    fn expire_installs_only_over_a_live_expiry() {
        let db = test_db();
        assert_eq!(
            exec(&command(&["EXPIRE", "missing", "10"]), &db),
            Frame::Integer(0)
        );

        // Key without a prior expiry is reported as not set.
        exec(&command(&["SET", "k", "v"]), &db);
        assert_eq!(exec(&command(&["EXPIRE", "k", "10"]), &db), Frame::Integer(0));
        assert_eq!(exec(&command(&["TTL", "k"]), &db), Frame::Integer(-1));

        // Key with a live expiry gets the new deadline.
        exec(&command(&["SET", "k", "v", "EX", "100"]), &db);
        assert_eq!(exec(&command(&["EXPIRE", "k", "20"]), &db), Frame::Integer(1));
        assert_eq!(exec(&command(&["TTL", "k"]), &db), Frame::Integer(20));

        // Key with an elapsed expiry is treated like an absent one.
        db.set_expiry("k", Some(ExpiryTime::from_millis(-1000)));
        assert_eq!(exec(&command(&["EXPIRE", "k", "20"]), &db), Frame::Integer(0));
    }

    #[test]
    fn expire_with_bad_integer_reports_unknown_command() {
        let db = test_db();
        assert_eq!(
            exec(&command(&["EXPIRE", "key", "invalid"]), &db),
            Frame::Error(
                "ERR unknown command 'EXPIRE', with args beginning with: 'key' 'invalid'".into()
            )
        );
    }

    #[test]
    fn del_counts_only_present_keys() {
        let db = test_db();
        exec(&command(&["SET", "b", "v"]), &db);
        assert_eq!(
            exec(&command(&["DEL", "a", "b", "c"]), &db),
            Frame::Integer(1)
        );
        assert_eq!(exec(&command(&["GET", "b"]), &db), Frame::Null);
        assert_eq!(
            exec(&command(&["DEL"]), &db),
            Frame::Error("ERR wrong number of arguments for 'del' command".into())
        );
    }

    #[test]
    fn unknown_command_echoes_name_and_args() {
        let db = test_db();
        assert_eq!(
            exec(&command(&["FLUSHALL", "now", "please"]), &db),
            Frame::Error(
                "ERR unknown command 'FLUSHALL', with args beginning with: 'now' 'please'".into()
            )
        );
        assert_eq!(
            exec(&command(&["NOPE"]), &db),
            Frame::Error("ERR unknown command 'NOPE', with args beginning with: ".into())
        );
    }

    #[test]
    fn command_names_are_case_folded() {
        let db = test_db();
        exec(&command(&["SeT", "k", "v"]), &db);
        assert_eq!(
            exec(&command(&["gEt", "k"]), &db),
            Frame::Bulk(Bytes::from_static(b"v"))
        );
    }

    #[test]
    fn non_array_frames_are_rejected() {
        assert!(Command::from_frame(Frame::Simple("PING".into())).is_err());
        assert!(Command::from_frame(Frame::Array(vec![])).is_err());
    }
}
