use crate::cmd::{arity_error, CommandError, Invalid};
use crate::utils::{resp_bulk, resp_err, resp_nil};
use crate::{Db, Frame, Parse};

/// Get the value of key.
///
/// If the key does not exist, or its expiry has elapsed by the time
/// of the read, the special value nil is returned. A successful read
/// refreshes the key's last-access clock.
#[derive(Debug, Clone)]
pub struct Get {
    /// Name of the key to get
    key: String,

    error: Option<CommandError>,
}

impl Get {
    /// Create a new `Get` command which fetches `key`.
    pub fn new(key: impl ToString) -> Get {
        Get {
            key: key.to_string(),
            error: None,
        }
    }

    /// Get the key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Parse a `Get` instance from a received frame.
    ///
    /// The `GET` string has already been consumed; exactly one key
    /// must remain.
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Get, CommandError> {
        let key = parse.next_string().map_err(|e| arity_error("get", e))?;
        if !parse.check_finish() {
            return Err(CommandError::WrongNumberOfArguments("get"));
        }

        Ok(Get::new(key))
    }

    /// Apply the `Get` command to the specified `Db` instance.
    pub(crate) fn get(&self, db: &Db) -> Frame {
        if let Some(err) = &self.error {
            return resp_err(err.to_string());
        }
        match db.get(&self.key) {
            Some(data) => resp_bulk(data),
            None => resp_nil(),
        }
    }
}

impl Invalid for Get {
    fn new_invalid(error: CommandError) -> Get {
        Get {
            key: "".to_owned(),
            error: Some(error),
        }
    }
}
