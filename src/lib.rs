//! Lead Assist — conversational lead qualification for the TEKGUYZ site.

pub mod cli;
pub mod config;
pub mod directives;
pub mod error;
pub mod gateway;
pub mod intake;
pub mod llm;
pub mod orchestrator;
