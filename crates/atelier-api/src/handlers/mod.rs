//! HTTP request handlers

pub mod org;
pub mod project;
pub mod source;
pub mod template;
