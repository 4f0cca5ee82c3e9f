use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::AmassConfig;
use crate::errors::{AmassError, Result};
use crate::native::process::{CommandRunner, ProcessOutput, RunError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcommand {
    Enum,
    Intel,
}

impl Subcommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subcommand::Enum => "enum",
            Subcommand::Intel => "intel",
        }
    }
}

impl FromStr for Subcommand {
    type Err = AmassError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enum" => Ok(Subcommand::Enum),
            "intel" => Ok(Subcommand::Intel),
            other => Err(AmassError::InvalidSubcommand(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumType {
    #[default]
    Active,
    Passive,
}

impl EnumType {
    /// Only "passive" switches modes; anything else enumerates actively.
    pub fn from_param(value: &str) -> Self {
        match value {
            "passive" => EnumType::Passive,
            "active" | "" => EnumType::Active,
            other => {
                tracing::warn!(enum_type = %other, "Unrecognized enum_type, using active");
                EnumType::Active
            }
        }
    }
}

/// One tool call's parameters. Empty strings from the wire become `None`.
#[derive(Debug, Clone, Default)]
pub struct InvocationRequest {
    pub subcommand: String,
    pub domain: Option<String>,
    pub intel_whois: bool,
    pub intel_organization: Option<String>,
    pub enum_type: EnumType,
    pub enum_brute: bool,
    pub enum_brute_wordlist: Option<String>,
}

/// A validated amass command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmassCommand {
    argv: Vec<String>,
}

impl AmassCommand {
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl fmt::Display for AmassCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))
    }
}

/// Validate `req` and assemble the argv for `binary`. The order of the
/// checks decides which error a malformed request reports.
pub fn build_command(binary: &str, req: &InvocationRequest) -> Result<AmassCommand> {
    let subcommand: Subcommand = req.subcommand.parse()?;
    let mut argv = vec![binary.to_string(), subcommand.as_str().to_string()];

    match subcommand {
        Subcommand::Enum => {
            let domain = req.domain.as_deref().ok_or(AmassError::MissingEnumDomain)?;
            argv.extend(["-d".to_string(), domain.to_string()]);

            if req.enum_type == EnumType::Passive {
                argv.push("-passive".to_string());
            }
            if req.enum_brute {
                argv.push("-brute".to_string());
                if let Some(wordlist) = &req.enum_brute_wordlist {
                    argv.extend(["-w".to_string(), wordlist.clone()]);
                }
            }
        }
        Subcommand::Intel => {
            if req.domain.is_none() && req.intel_organization.is_none() {
                return Err(AmassError::MissingIntelTarget);
            }
            if let Some(domain) = &req.domain {
                if !req.intel_whois {
                    return Err(AmassError::WhoisRequired);
                }
                argv.extend(["-d".to_string(), domain.clone()]);
            }
            if let Some(org) = &req.intel_organization {
                argv.extend(["-org".to_string(), org.clone()]);
            }
            if req.intel_whois {
                argv.push("-whois".to_string());
            }
        }
    }

    Ok(AmassCommand { argv })
}

/// Successful run of amass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Output { text: String, command: String },
    NoOutput { command: String },
}

impl Completion {
    pub fn command(&self) -> &str {
        match self {
            Completion::Output { command, .. } | Completion::NoOutput { command } => command,
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Output { text, .. } => f.write_str(text),
            Completion::NoOutput { command } => write!(
                f,
                "Amass completed successfully but returned no output.\nCommand: {}",
                command
            ),
        }
    }
}

fn complete(output: ProcessOutput, command: String) -> Result<Completion> {
    let (ok, code) = (output.success(), output.code);
    let mut combined = output.stdout;
    if !output.stderr.is_empty() {
        combined.push_str("\n\nStderr:\n");
        combined.push_str(&output.stderr);
    }

    if !ok {
        return Err(AmassError::NonZeroExit {
            code,
            output: combined,
            command,
        });
    }
    if combined.trim().is_empty() {
        return Ok(Completion::NoOutput { command });
    }
    Ok(Completion::Output {
        text: combined,
        command,
    })
}

/// Validates requests and runs amass, at most `max_concurrent` at a time.
pub struct AmassDispatcher {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl AmassDispatcher {
    pub fn new(config: &AmassConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            binary: config.binary.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
        }
    }

    pub async fn dispatch(&self, req: &InvocationRequest) -> Result<Completion> {
        let command = build_command(&self.binary, req)?;
        let command_str = command.to_string();

        let _permit = self.permits.acquire().await.map_err(|e| AmassError::Launch {
            source: std::io::Error::other(e),
            command: command_str.clone(),
        })?;

        tracing::info!("Executing: {}", command_str);

        let output = self
            .runner
            .run(command.argv(), self.timeout)
            .await
            .map_err(|e| self.map_run_error(e, &command_str))?;

        complete(output, command_str)
    }

    fn map_run_error(&self, err: RunError, command: &str) -> AmassError {
        match err {
            RunError::TimedOut(_) => {
                tracing::warn!(command = %command, "Amass timed out after {}s", self.timeout.as_secs());
                AmassError::Timeout {
                    secs: self.timeout.as_secs(),
                    command: command.to_string(),
                }
            }
            RunError::Io(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
                ) =>
            {
                tracing::warn!(binary = %self.binary, "Amass binary not runnable: {}", e);
                AmassError::BinaryNotFound {
                    command: command.to_string(),
                }
            }
            RunError::Io(e) => {
                tracing::warn!(command = %command, "Amass launch failed: {}", e);
                AmassError::Launch {
                    source: e,
                    command: command.to_string(),
                }
            }
        }
    }
}
