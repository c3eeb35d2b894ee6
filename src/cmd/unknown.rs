use crate::cmd::format_command_args;
use crate::Frame;

/// Represents an "unknown" command. This is not a real command.
#[derive(Debug, Clone)]
pub struct Unknown {
    command_name: String,
    args: Vec<String>,
}

impl Unknown {
    /// Create a new `Unknown` command which responds to unknown
    /// commands issued by clients. The command name keeps the
    /// spelling the client sent.
    pub(crate) fn new(command_name: impl ToString, args: Vec<String>) -> Unknown {
        Unknown {
            command_name: command_name.to_string(),
            args,
        }
    }

    /// Returns the command name
    pub(crate) fn get_name(&self) -> &str {
        &self.command_name
    }

    /// Responds to the client, indicating the command is not
    /// recognized.
    pub(crate) fn reply(&self) -> Frame {
        Frame::Error(format!(
            "ERR unknown command '{}', with args beginning with: {}",
            self.command_name,
            format_command_args(&self.args)
        ))
    }
}
