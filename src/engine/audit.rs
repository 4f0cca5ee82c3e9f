use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub tool: String,
    pub params: Value,
    pub decision: String,
    pub result: String,
    pub command: Option<String>,
    pub duration_ms: u64,
}

/// Appends one JSON line per tool call. Write failures are logged and
/// swallowed so auditing never fails a call.
#[derive(Clone)]
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: path.into(),
        }
    }

    pub async fn log(
        &self,
        tool: &str,
        params: &Value,
        decision: &str,
        result: &str,
        command: Option<&str>,
        duration_ms: u64,
    ) {
        let event = AuditEvent {
            timestamp: Utc::now().to_rfc3339(),
            tool: tool.to_string(),
            params: params.clone(),
            decision: decision.to_string(),
            result: result.to_string(),
            command: command.map(str::to_string),
            duration_ms,
        };

        let json_line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Audit event serialization failed: {}", e);
                return;
            }
        };

        let log_path = self.log_path.clone();
        let handle = tokio::task::spawn_blocking(move || append_line(&log_path, &json_line));

        if let Err(e) = handle.await {
            tracing::error!("Audit log task panicked: {}", e);
        }
    }
}

fn append_line(path: &Path, line: &str) {
    let written = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "{}", line));

    if let Err(e) = written {
        tracing::warn!(path = %path.display(), "Audit append failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent {
            timestamp: "2026-02-22T14:03:43Z".into(),
            tool: "amass".into(),
            params: serde_json::json!({"subcommand": "enum", "domain": "example.com"}),
            decision: "allowed".into(),
            result: "success".into(),
            command: Some("amass enum -d example.com".into()),
            duration_ms: 12,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("timestamp"));
        assert!(json.contains("\"tool\":\"amass\""));
        assert!(json.contains("\"decision\":\"allowed\""));
        assert!(json.contains("amass enum -d example.com"));
        assert!(json.contains("12"));
    }

    #[tokio::test]
    async fn test_audit_log_appends_lines() {
        let path = std::env::temp_dir().join(format!("amass-mcp-audit-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let logger = AuditLogger::new(&path);

        logger.log("amass", &serde_json::json!({"subcommand": "scan"}), "allowed", "validation", None, 0).await;
        logger
            .log("amass", &serde_json::json!({"subcommand": "enum"}), "allowed", "success", Some("amass enum -d example.com"), 40)
            .await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["decision"], "allowed");
        assert_eq!(second["result"], "success");
        assert_eq!(second["command"], "amass enum -d example.com");
        assert_eq!(second["duration_ms"], 40);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_audit_log_unwritable_path_does_not_panic() {
        let logger = AuditLogger::new("/nonexistent-dir/amass-mcp/audit.log");
        logger.log("amass", &serde_json::json!({}), "allowed", "success", None, 1).await;
    }
}
