// src/agentrelay/mod.rs

pub mod agent_card;
pub mod client;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod http_client_pool;
pub mod llm_session;
pub mod personas;
pub mod registry;
pub mod server;
pub mod task;
pub mod tool;
pub mod tool_protocol;
pub mod tools;

// Export LLMSession so it is reachable as agentrelay::LLMSession as well
pub use llm_session::LLMSession;
