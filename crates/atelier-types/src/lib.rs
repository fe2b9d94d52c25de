//! # Atelier Types - Entity Model
//!
//! Shared entity definitions for organizations, projects, sources, access
//! tokens and pipeline templates, plus the request/response DTOs exposed by
//! the HTTP layer.

pub mod dto;
pub mod org;
pub mod project;
pub mod template;
pub mod token;

pub use org::Org;
pub use project::{Project, Source};
pub use template::PipelineTemplate;
pub use token::AccessToken;
