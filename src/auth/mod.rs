pub mod catalog;
mod claims;
pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod policy;
pub mod rbac;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod tokens;

pub use claims::SessionClaims;
