use crate::cmd::{arity_error, CommandError, Invalid};
use crate::utils::{resp_err, resp_int};
use crate::{Db, Frame, KeyExpiry, Parse};

/// Returns the remaining time to live of a key, in whole seconds
/// rounded to nearest.
///
/// Answers `-2` if the key does not exist (or its expiry has
/// elapsed) and `-1` if the key exists but has no expiry. Unlike
/// `GET`, observing an elapsed expiry here does not delete the key.
#[derive(Debug, Clone)]
pub struct TTL {
    key: String,

    error: Option<CommandError>,
}

impl TTL {
    pub fn new(key: impl ToString) -> TTL {
        TTL {
            key: key.to_string(),
            error: None,
        }
    }

    /// Get the key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<TTL, CommandError> {
        let key = parse.next_string().map_err(|e| arity_error("ttl", e))?;
        if !parse.check_finish() {
            return Err(CommandError::WrongNumberOfArguments("ttl"));
        }

        Ok(TTL::new(key))
    }

    /// Apply the `TTL` command to the specified `Db` instance.
    pub(crate) fn ttl(&self, db: &Db) -> Frame {
        if let Some(err) = &self.error {
            return resp_err(err.to_string());
        }
        match db.get_expiry(&self.key) {
            KeyExpiry::Missing => resp_int(-2),
            KeyExpiry::Persistent => resp_int(-1),
            KeyExpiry::At(at) => {
                if at.is_expired() {
                    resp_int(-2)
                } else {
                    resp_int(at.remaining_secs())
                }
            }
        }
    }
}

impl Invalid for TTL {
    fn new_invalid(error: CommandError) -> TTL {
        TTL {
            key: "".to_owned(),
            error: Some(error),
        }
    }
}
