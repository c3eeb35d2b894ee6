use crate::cmd::{arity_error, CommandError, Invalid};
use crate::utils::{resp_err, resp_ok, ExpiryTime};
use crate::{Db, Frame, Parse, ParseError};

use bytes::Bytes;

/// Set `key` to hold the string `value`.
///
/// If `key` already holds a value, it is overwritten. Any previous
/// time to live associated with the key is discarded unless the
/// command installs a new one.
///
/// # Options
///
/// Currently, the following options are supported:
///
/// * EX `seconds` -- Set the specified expire time, in seconds.
/// * PX `milliseconds` -- Set the specified expire time, in milliseconds.
///
/// At most one of the two may appear. The argument is a signed
/// 64-bit integer, so a non-positive delta installs a deadline that
/// has already elapsed.
#[derive(Debug, Clone)]
pub struct Set {
    /// the lookup key
    key: String,

    /// the value to be stored
    value: Bytes,

    /// When to expire the key
    expire: Option<ExpiryTime>,

    error: Option<CommandError>,
}

impl Set {
    /// Create a new `Set` command which sets `key` to `value`.
    ///
    /// If `expire` is `Some`, the value expires at the given
    /// deadline.
    pub fn new(key: impl ToString, value: Bytes, expire: Option<ExpiryTime>) -> Set {
        Set {
            key: key.to_string(),
            value,
            expire,
            error: None,
        }
    }

    /// Get the key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the value
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Get the expire
    pub fn expire(&self) -> Option<ExpiryTime> {
        self.expire
    }

    /// Parse a `Set` instance from a received frame.
    ///
    /// The `SET` string has already been consumed.
    ///
    /// # Format
    ///
    /// ```text
    /// SET key value [EX seconds|PX milliseconds]
    /// ```
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Set, CommandError> {
        // Read the key to set. This is a required field
        let key = parse.next_string().map_err(|e| arity_error("set", e))?;

        // Read the value to set. This is a required field.
        let value = parse.next_bytes().map_err(|e| arity_error("set", e))?;

        // The expiration is optional. If nothing else follows, then
        // it is `None` and any previous expiry is discarded on apply.
        let mut expire = None;

        loop {
            let token = match parse.next_string() {
                Ok(token) => token,
                // `EndOfStream` here is the normal run time case of
                // a `SET` with no further options.
                Err(ParseError::EndOfStream) => break,
                Err(_) => return Err(CommandError::Syntax),
            };

            match token.to_lowercase().as_str() {
                "ex" => {
                    // An expiration is specified in seconds. A second
                    // expiry option is a syntax error.
                    if expire.is_some() {
                        return Err(CommandError::Syntax);
                    }
                    let secs = next_option_int(parse)?;
                    expire = Some(ExpiryTime::from_secs(secs));
                }
                "px" => {
                    // An expiration is specified in milliseconds.
                    if expire.is_some() {
                        return Err(CommandError::Syntax);
                    }
                    let ms = next_option_int(parse)?;
                    expire = Some(ExpiryTime::from_millis(ms));
                }
                _ => return Err(CommandError::Syntax),
            }
        }

        Ok(Set::new(key, value, expire))
    }

    /// Apply the `Set` command to the specified `Db` instance.
    pub(crate) fn set(&self, db: &Db) -> Frame {
        if let Some(err) = &self.error {
            return resp_err(err.to_string());
        }
        db.put(self.key.clone(), self.value.clone(), self.expire);
        resp_ok()
    }
}

/// Reads the integer argument of an `EX`/`PX` option.
fn next_option_int(parse: &mut Parse) -> Result<i64, CommandError> {
    let raw = parse.next_string().map_err(|_| CommandError::Syntax)?;
    raw.parse::<i64>().map_err(|_| CommandError::ValueNotInteger)
}

impl Invalid for Set {
    fn new_invalid(error: CommandError) -> Set {
        Set {
            key: "".to_owned(),
            value: Bytes::new(),
            expire: None,
            error: Some(error),
        }
    }
}
