//! # agentrelay
//!
//! Process launcher for the stock agents and a small orchestrator front end.
//!
//! - `agentrelay serve translator|assistant [--host] [--port]` runs one specialist until Ctrl-C
//!   or SIGTERM, then drains in-flight tasks.
//! - `agentrelay agents` lists the agents in `A2A_AGENTS` (or the default registry).
//! - `agentrelay ask <agent> <message>` performs one delegation and prints the result.

use agentrelay::client::{render_agent_summaries, RemoteAgentClient};
use agentrelay::clients::openai_compatible::OpenAICompatibleClient;
use agentrelay::config::{LlmConfig, RemoteAgentClientConfig};
use agentrelay::event::LoggingEventHandler;
use agentrelay::executor::LlmCompletion;
use agentrelay::personas::{default_registry, Persona};
use agentrelay::registry::AgentRegistry;
use agentrelay::server::{shutdown_signal, A2AServerBuilder};
use agentrelay::tool_protocol::ToolRegistry;
use clap::{Parser, Subcommand};
use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Agent-to-agent task delegation over HTTP
#[derive(Parser)]
#[command(name = "agentrelay")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a specialist agent listener
    Serve {
        #[arg(value_enum)]
        persona: Persona,

        /// Port to bind (defaults to the persona's port)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
    },

    /// List the registered remote agents and whether they are reachable
    Agents,

    /// Delegate one request to a remote agent and print its answer
    Ask {
        /// Registered agent name
        agent: String,
        /// Request text
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    agentrelay::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            persona,
            port,
            host,
        } => serve(persona, host, port.unwrap_or(persona.default_port())).await,
        Commands::Agents => {
            let client = orchestrator_client()?;
            let agents = client.list_available_agents().await;
            println!("{}", render_agent_summaries(&agents));
            Ok(())
        }
        Commands::Ask { agent, message } => {
            let client = orchestrator_client()?;
            let answer = client.invoke_remote_agent(&agent, &message).await?;
            println!("{}", answer);
            Ok(())
        }
    }
}

async fn serve(
    persona: Persona,
    host: IpAddr,
    port: u16,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let llm_config = LlmConfig::from_env();
    log::info!(
        "using model '{}' at {}",
        llm_config.model,
        llm_config.api_base
    );
    let client = Arc::new(OpenAICompatibleClient::from_config(&llm_config));
    let mut tools = ToolRegistry::new();
    tools.add_protocol(Arc::new(persona.tools())).await?;
    let logic = LlmCompletion::new(client, persona.system_prompt()).with_tools(Arc::new(tools));

    let advertised_host = if host.is_unspecified() {
        "localhost".to_string()
    } else {
        host.to_string()
    };
    let card = persona.card(format!("http://{}:{}", advertised_host, port));

    let server = A2AServerBuilder::new(card, Arc::new(logic))
        .with_event_handler(Arc::new(LoggingEventHandler))
        .start_at(SocketAddr::new(host, port))
        .await?;
    println!("{} listening on {}", server.card().name, server.base_url());

    let remaining = server.run_until(shutdown_signal()?).await?;
    if remaining > 0 {
        log::warn!("stopped with {} task(s) still running", remaining);
    }
    Ok(())
}

fn orchestrator_client() -> Result<RemoteAgentClient, Box<dyn Error + Send + Sync>> {
    let registry = AgentRegistry::from_env()?.unwrap_or_else(default_registry);
    let config = RemoteAgentClientConfig::from_env()?;
    Ok(RemoteAgentClient::with_config(registry, config))
}
