//! Error types for the amass tool.
//!
//! Every variant renders to the exact text handed back to the MCP caller,
//! so the `Display` output is part of the tool contract.

use thiserror::Error;

/// Coarse classification used for audit records and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Timeout,
    NotFound,
    Launch,
    NonZeroExit,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Launch => "launch",
            ErrorKind::NonZeroExit => "non_zero_exit",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum AmassError {
    #[error("Error: subcommand must be 'enum' or 'intel', got '{0}'")]
    InvalidSubcommand(String),

    #[error("Error: Domain parameter is required for 'enum' subcommand")]
    MissingEnumDomain,

    #[error("Error: Either domain or organization parameter is required for 'intel' subcommand")]
    MissingIntelTarget,

    #[error("Error: For domain parameter, whois is required. Set intel_whois=true")]
    WhoisRequired,

    #[error("Error: Amass command timed out after {secs} seconds.\nCommand: {command}")]
    Timeout { secs: u64, command: String },

    #[error("Error: Amass binary not found. Ensure amass is installed.\nCommand: {command}")]
    BinaryNotFound { command: String },

    #[error("Error executing amass: {source}\nCommand: {command}")]
    Launch {
        #[source]
        source: std::io::Error,
        command: String,
    },

    #[error("Amass exited with code {code}.\nOutput: {output}\nCommand: {command}")]
    NonZeroExit {
        code: i32,
        output: String,
        command: String,
    },
}

impl AmassError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AmassError::InvalidSubcommand(_)
            | AmassError::MissingEnumDomain
            | AmassError::MissingIntelTarget
            | AmassError::WhoisRequired => ErrorKind::Validation,
            AmassError::Timeout { .. } => ErrorKind::Timeout,
            AmassError::BinaryNotFound { .. } => ErrorKind::NotFound,
            AmassError::Launch { .. } => ErrorKind::Launch,
            AmassError::NonZeroExit { .. } => ErrorKind::NonZeroExit,
        }
    }

    /// The attempted command line; validation failures never build one.
    pub fn command(&self) -> Option<&str> {
        match self {
            AmassError::Timeout { command, .. }
            | AmassError::BinaryNotFound { command }
            | AmassError::Launch { command, .. }
            | AmassError::NonZeroExit { command, .. } => Some(command.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AmassError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        let err = AmassError::InvalidSubcommand("scan".into());
        assert_eq!(err.to_string(), "Error: subcommand must be 'enum' or 'intel', got 'scan'");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(AmassError::WhoisRequired.kind(), ErrorKind::Validation);
        assert!(AmassError::MissingEnumDomain.command().is_none());
    }

    #[test]
    fn test_launch_message_includes_source_and_command() {
        let err = AmassError::Launch {
            source: std::io::Error::other("resource temporarily unavailable"),
            command: "amass enum -d example.com".into(),
        };
        let text = err.to_string();
        assert!(text.starts_with("Error executing amass: resource temporarily unavailable"));
        assert!(text.ends_with("Command: amass enum -d example.com"));
        assert_eq!(err.kind().as_str(), "launch");
        assert_eq!(err.command(), Some("amass enum -d example.com"));
    }
}
