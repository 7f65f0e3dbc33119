//! # agentrelay
//!
//! agentrelay lets one agent delegate a unit of work to another agent running as a separate
//! process, discover what that agent can do, and observe the task until it finishes.
//!
//! The crate is layered as follows:
//!
//! * **Capability discovery**: every agent publishes an [`agent_card::AgentCard`] describing its
//!   skills and accepted content types.
//! * **Task lifecycle**: a [`task::Task`] moves `submitted → working → completed | failed |
//!   canceled` under the control of the specialist's [`executor::TaskExecutor`].
//! * **Transport**: [`server::A2AServerBuilder`] exposes an executor over HTTP; the
//!   [`client::RemoteAgentClient`] talks to it.
//! * **Tool surface**: [`tool::RemoteAgentProtocol`] presents remote agents to an orchestrating
//!   model as ordinary tools through [`tool_protocol::ToolProtocol`].
//! * **Local tools**: [`tools::LocalToolProtocol`] gives a specialist's model a calculator and a
//!   clock.
//! * **Completion boundary**: specialists produce results through a
//!   [`executor::CompletionLogic`]; [`executor::LlmCompletion`] drives any [`ClientWrapper`],
//!   such as the bundled OpenAI-compatible client.
//!
//! ## Serving a specialist
//!
//! ```rust,no_run
//! use agentrelay::clients::openai_compatible::OpenAICompatibleClient;
//! use agentrelay::config::LlmConfig;
//! use agentrelay::executor::LlmCompletion;
//! use agentrelay::personas::Persona;
//! use agentrelay::server::A2AServerBuilder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     agentrelay::init_logger();
//!
//!     let persona = Persona::Translator;
//!     let client = Arc::new(OpenAICompatibleClient::from_config(&LlmConfig::from_env()));
//!     let logic = LlmCompletion::new(client, persona.system_prompt());
//!
//!     let server = A2AServerBuilder::new(persona.card("http://localhost:8001"), Arc::new(logic))
//!         .start_on(persona.default_port())
//!         .await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Delegating from an orchestrator
//!
//! ```rust,no_run
//! use agentrelay::client::RemoteAgentClient;
//! use agentrelay::personas::default_registry;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = RemoteAgentClient::new(default_registry());
//!     match client
//!         .invoke_remote_agent("translator", "Translate 'hello' to Japanese")
//!         .await
//!     {
//!         Ok(text) => println!("{}", text),
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Verbosity is controlled with `RUST_LOG`.
///
/// ```rust
/// agentrelay::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `agentrelay` module.
pub mod agentrelay;

// Re-exporting key items for easier external access.
pub use agentrelay::agent_card;
pub use agentrelay::client;
pub use agentrelay::client_wrapper;
pub use agentrelay::client_wrapper::{ClientWrapper, Message, Role, TokenUsage};
pub use agentrelay::clients;
pub use agentrelay::config;
pub use agentrelay::error;
pub use agentrelay::error::{A2AError, ConfigError};
pub use agentrelay::event;
pub use agentrelay::event::{EventHandler, RelayEvent};
pub use agentrelay::executor;
pub use agentrelay::http_client_pool;
pub use agentrelay::llm_session;
pub use agentrelay::llm_session::LLMSession;
pub use agentrelay::personas;
pub use agentrelay::registry;
pub use agentrelay::server;
pub use agentrelay::task;
pub use agentrelay::tool;
pub use agentrelay::tool_protocol;
pub use agentrelay::tools;
