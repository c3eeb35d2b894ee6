use crate::cmd::{arity_error, format_command_args, CommandError, Invalid};
use crate::utils::{resp_err, resp_int, ExpiryTime};
use crate::{Db, Frame, KeyExpiry, Parse};

/// Set a timeout on a key, in seconds from now.
///
/// Answers `:1` when the deadline was installed and `:0` when it was
/// not: the key is absent, its current expiry has already elapsed,
/// or it carries no expiry at all. Arguments beyond the first two
/// are accepted and ignored.
#[derive(Debug, Clone)]
pub struct Expire {
    key: String,
    seconds: i64,

    error: Option<CommandError>,
}

impl Expire {
    pub fn new(key: impl ToString, seconds: i64) -> Expire {
        Expire {
            key: key.to_string(),
            seconds,
            error: None,
        }
    }

    /// Get the key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Expire, CommandError> {
        let key = parse.next_string().map_err(|e| arity_error("expire", e))?;
        let raw = parse.next_string().map_err(|e| arity_error("expire", e))?;

        let mut args = vec![key.clone(), raw.clone()];
        while let Ok(extra) = parse.next_string() {
            args.push(extra);
        }

        // A non-integer timeout is reported as an unrecognized
        // command naming the arguments, not as an integer error.
        let seconds = raw.parse::<i64>().map_err(|_| CommandError::UnknownCommand {
            cmd: "EXPIRE".to_string(),
            args: format_command_args(&args),
        })?;

        Ok(Expire::new(key, seconds))
    }

    /// Apply the `Expire` command to the specified `Db` instance.
    pub(crate) fn expire(&self, db: &Db) -> Frame {
        if let Some(err) = &self.error {
            return resp_err(err.to_string());
        }
        match db.get_expiry(&self.key) {
            KeyExpiry::At(at) if !at.is_expired() => {
                db.set_expiry(&self.key, Some(ExpiryTime::from_secs(self.seconds)));
                resp_int(1)
            }
            _ => resp_int(0),
        }
    }
}

impl Invalid for Expire {
    fn new_invalid(error: CommandError) -> Expire {
        Expire {
            key: "".to_owned(),
            seconds: 0,
            error: Some(error),
        }
    }
}
