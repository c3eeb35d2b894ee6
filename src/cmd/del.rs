use crate::cmd::{CommandError, Invalid};
use crate::utils::{resp_err, resp_int};
use crate::{Db, Frame, Parse};

/// Removes the specified keys. A key is ignored if it does not
/// exist. Answers the number of keys that were removed.
#[derive(Debug, Clone)]
pub struct Del {
    keys: Vec<String>,

    error: Option<CommandError>,
}

impl Del {
    /// Get the keys
    pub fn keys(&self) -> &Vec<String> {
        &self.keys
    }

    pub fn add_key(&mut self, key: String) {
        self.keys.push(key);
    }

    /// Parse a `Del` instance from a received frame.
    ///
    /// The `DEL` string has already been consumed; at least one key
    /// must follow.
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Del, CommandError> {
        let mut del = Del::default();
        while let Ok(key) = parse.next_string() {
            del.add_key(key);
        }
        if del.keys.is_empty() {
            return Err(CommandError::WrongNumberOfArguments("del"));
        }
        Ok(del)
    }

    /// Apply the `Del` command to the specified `Db` instance.
    pub(crate) fn del(&self, db: &Db) -> Frame {
        if let Some(err) = &self.error {
            return resp_err(err.to_string());
        }
        let mut deleted = 0;
        for key in &self.keys {
            if db.delete(key) {
                deleted += 1;
            }
        }
        resp_int(deleted)
    }
}

impl Default for Del {
    /// Create a new `Del` command with an empty key vector.
    fn default() -> Self {
        Del {
            keys: vec![],
            error: None,
        }
    }
}

impl Invalid for Del {
    fn new_invalid(error: CommandError) -> Self {
        Del {
            keys: vec![],
            error: Some(error),
        }
    }
}
