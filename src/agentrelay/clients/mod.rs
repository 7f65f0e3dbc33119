// src/agentrelay/clients/mod.rs

pub mod openai_compatible;
