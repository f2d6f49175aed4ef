use std::io::Read;
use std::sync::Arc;

use vault_agent::agent::{HttpAgent, HttpAgentConfig};
use vault_agent::config::WorkflowConfig;
use vault_agent::email::EmailInput;
use vault_agent::pipeline::Workflow;
use vault_agent::schema::SchemaRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WorkflowConfig::from_env();

    let agent_config = HttpAgentConfig {
        endpoint: std::env::var("VAULT_AGENT_ENDPOINT")
            .unwrap_or_else(|_| HttpAgentConfig::default().endpoint),
        model: std::env::var("VAULT_AGENT_MODEL")
            .unwrap_or_else(|_| HttpAgentConfig::default().model),
        api_key: std::env::var("VAULT_AGENT_API_KEY")
            .ok()
            .map(secrecy::SecretString::from),
        ..HttpAgentConfig::default()
    };

    eprintln!("vault-agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("  endpoint: {}", agent_config.endpoint);
    eprintln!("  model: {}", agent_config.model);
    eprintln!(
        "  threshold: {} / retries: {}",
        config.confidence_threshold, config.max_retries
    );

    let agent = Arc::new(HttpAgent::new(agent_config));
    let registry = Arc::new(SchemaRegistry::builtin());
    let workflow = Workflow::new(agent, registry, config);

    // Input: a raw RFC 822 file path as the first argument, or an
    // EmailInput JSON document on stdin.
    let email = match std::env::args().nth(1) {
        Some(path) => EmailInput::from_rfc822(&std::fs::read(&path)?)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            serde_json::from_str(&buf)?
        }
    };

    let response = workflow.run(email).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
