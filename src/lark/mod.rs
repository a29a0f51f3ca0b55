//! Lark (source directory) client, event models and path resolution

pub mod client;
pub mod models;
pub mod resolver;
pub mod traits;

pub use client::LarkClient;
pub use models::{ChangeEvent, DepartmentSnapshot, UserSnapshot, ROOT_DEPARTMENT_ID};
pub use resolver::resolve_full_path;
pub use traits::SourceDirectory;

#[cfg(test)]
pub(crate) mod mock;
