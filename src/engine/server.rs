use rmcp::{
    handler::server::{ServerHandler, tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
    ErrorData as McpError,
};
use crate::engine::audit::AuditLogger;
use crate::providers::amass::{AmassDispatcher, EnumType, InvocationRequest};
use std::sync::Arc;

#[derive(Clone)]
pub struct AmassEngine {
    tool_router: ToolRouter<Self>,
    pub dispatcher: Arc<AmassDispatcher>,
    pub audit: Option<Arc<AuditLogger>>,
}

impl AmassEngine {
    /// Runs one amass call end to end. Failures come back as error-flagged
    /// text content, never as a protocol error.
    pub async fn run_amass(&self, args: AmassArgs) -> CallToolResult {
        let tool_name = "amass";
        let params = serde_json::to_value(&args).unwrap_or_default();
        let start = std::time::Instant::now();

        let request = InvocationRequest::from(args);

        let (result, outcome, command) = match self.dispatcher.dispatch(&request).await {
            Ok(done) => (
                CallToolResult::success(vec![Content::text(done.to_string())]),
                "success".to_string(),
                Some(done.command().to_string()),
            ),
            Err(e) => {
                tracing::info!(kind = %e.kind(), "amass call failed");
                (
                    CallToolResult::error(vec![Content::text(e.to_string())]),
                    e.kind().to_string(),
                    e.command().map(str::to_string),
                )
            }
        };

        self.complete_tool_call(tool_name, &params, &outcome, command.as_deref(), start).await;
        result
    }

    async fn complete_tool_call(
        &self,
        tool: &str,
        params: &serde_json::Value,
        outcome: &str,
        command: Option<&str>,
        start: std::time::Instant,
    ) {
        let duration = start.elapsed().as_millis() as u64;
        if let Some(audit) = &self.audit {
            audit.log(tool, params, "allowed", outcome, command, duration).await;
        }
    }
}

// ── Argument structs ──────────────────────────────────────────────────

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct AmassArgs {
    #[schemars(description = "Specify the Amass operation mode - 'intel' for gathering intelligence about target domains, 'enum' for subdomain enumeration and network mapping")]
    pub subcommand: String,
    #[serde(default)]
    #[schemars(description = "Target domain to perform reconnaissance against (e.g., example.com)")]
    pub domain: String,
    #[serde(default)]
    #[schemars(description = "Whether to include WHOIS data in intelligence gathering (true/false)")]
    pub intel_whois: bool,
    #[serde(default)]
    #[schemars(description = "Organization name to search for during intelligence gathering (e.g., 'Example Corp')")]
    pub intel_organization: String,
    #[serde(default = "default_enum_type")]
    #[schemars(description = "Enumeration approach type - 'active' includes DNS resolution, 'passive' only uses third-party sources")]
    pub enum_type: String,
    #[serde(default)]
    #[schemars(description = "Whether to perform brute force subdomain discovery (true/false)")]
    pub enum_brute: bool,
    #[serde(default)]
    #[schemars(description = "Path to custom wordlist file for brute force operations")]
    pub enum_brute_wordlist: String,
}

fn default_enum_type() -> String {
    "active".to_string()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl From<AmassArgs> for InvocationRequest {
    fn from(args: AmassArgs) -> Self {
        Self {
            subcommand: args.subcommand,
            domain: non_empty(args.domain),
            intel_whois: args.intel_whois,
            intel_organization: non_empty(args.intel_organization),
            enum_type: EnumType::from_param(&args.enum_type),
            enum_brute: args.enum_brute,
            enum_brute_wordlist: non_empty(args.enum_brute_wordlist),
        }
    }
}

// ── Tool implementations ──────────────────────────────────────────────

#[tool_router]
impl AmassEngine {
    pub fn new(dispatcher: Arc<AmassDispatcher>, audit: Option<Arc<AuditLogger>>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            dispatcher,
            audit,
        }
    }

    #[tool(
        name = "amass",
        description = "Advanced subdomain enumeration and reconnaissance tool using OWASP Amass. \
                       'enum' maps subdomains of a domain (active or passive, optional brute force); \
                       'intel' gathers intelligence about a domain (requires intel_whois) or an organization."
    )]
    async fn amass(
        &self,
        args: Parameters<AmassArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.run_amass(args.0).await)
    }
}

#[tool_handler]
impl ServerHandler for AmassEngine {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "amass-mcp runs OWASP Amass on the server host. Call the 'amass' tool \
                 with subcommand 'enum' or 'intel'; results and errors are returned as text. \
                 Served over streamable HTTP at /mcp; legacy SSE-only clients are not supported.".into()
            ),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AmassConfig;
    use crate::native::process::{CommandRunner, ProcessOutput, RunError};
    use async_trait::async_trait;
    use std::time::Duration;

    struct EchoRunner;

    #[async_trait]
    impl CommandRunner for EchoRunner {
        async fn run(&self, argv: &[String], _timeout: Duration) -> std::result::Result<ProcessOutput, RunError> {
            Ok(ProcessOutput { code: 0, stdout: argv.join(" "), stderr: String::new() })
        }
    }

    fn engine(audit: Option<Arc<AuditLogger>>) -> AmassEngine {
        let dispatcher = AmassDispatcher::new(&AmassConfig::default(), Arc::new(EchoRunner));
        AmassEngine::new(Arc::new(dispatcher), audit)
    }

    fn args(json: serde_json::Value) -> AmassArgs {
        serde_json::from_value(json).unwrap()
    }

    fn text_of(result: &CallToolResult) -> String {
        result
            .content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_args_defaults() {
        let a = args(serde_json::json!({"subcommand": "enum"}));
        assert_eq!(a.domain, "");
        assert!(!a.intel_whois);
        assert_eq!(a.intel_organization, "");
        assert_eq!(a.enum_type, "active");
        assert!(!a.enum_brute);
        assert_eq!(a.enum_brute_wordlist, "");
    }

    #[test]
    fn test_args_empty_strings_become_absent() {
        let req = InvocationRequest::from(args(serde_json::json!({
            "subcommand": "intel",
            "domain": "",
            "intel_organization": "Example Corp",
        })));
        assert!(req.domain.is_none());
        assert_eq!(req.intel_organization.as_deref(), Some("Example Corp"));
        assert!(req.enum_brute_wordlist.is_none());
    }

    #[test]
    fn test_engine_info() {
        let info = engine(None).get_info();
        assert!(info.capabilities.tools.is_some());
        let instructions = info.instructions.unwrap();
        assert!(instructions.contains("amass"));
        assert!(instructions.contains("streamable HTTP at /mcp"));
    }

    #[test]
    fn test_amass_tool_registered() {
        let tools = engine(None).tool_router.list_all();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "amass");
    }

    #[tokio::test]
    async fn test_run_amass_success() {
        let result = engine(None)
            .run_amass(args(serde_json::json!({
                "subcommand": "enum",
                "domain": "example.com",
                "enum_type": "passive",
            })))
            .await;
        assert_ne!(result.is_error, Some(true));
        assert_eq!(text_of(&result), "amass enum -d example.com -passive");
    }

    #[tokio::test]
    async fn test_run_amass_validation_error_is_text() {
        let result = engine(None)
            .run_amass(args(serde_json::json!({"subcommand": "scan"})))
            .await;
        assert_eq!(result.is_error, Some(true));
        assert_eq!(text_of(&result), "Error: subcommand must be 'enum' or 'intel', got 'scan'");
    }

    #[tokio::test]
    async fn test_run_amass_writes_audit() {
        let path = std::env::temp_dir().join(format!("amass-mcp-engine-audit-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let audit = Arc::new(AuditLogger::new(&path));

        engine(Some(audit))
            .run_amass(args(serde_json::json!({
                "subcommand": "intel",
                "domain": "example.com",
                "intel_whois": false,
            })))
            .await;

        let content = std::fs::read_to_string(&path).unwrap();
        let event: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(event["tool"], "amass");
        assert_eq!(event["decision"], "allowed");
        assert_eq!(event["result"], "validation");
        assert_eq!(event["params"]["domain"], "example.com");
        assert!(event["command"].is_null());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_run_amass_audits_command_once_built() {
        let path = std::env::temp_dir().join(format!("amass-mcp-engine-audit-ok-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let audit = Arc::new(AuditLogger::new(&path));

        engine(Some(audit))
            .run_amass(args(serde_json::json!({
                "subcommand": "intel",
                "domain": "example.com",
                "intel_whois": true,
            })))
            .await;

        let content = std::fs::read_to_string(&path).unwrap();
        let event: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(event["result"], "success");
        assert_eq!(event["command"], "amass intel -d example.com -whois");

        let _ = std::fs::remove_file(&path);
    }
}
