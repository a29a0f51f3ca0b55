//! Keycloak (target identity store) client and group-forest lookups

pub mod client;
pub mod models;
pub mod traits;
pub mod tree;

pub use client::KeycloakClient;
pub use models::{GroupNode, UserRecord};
pub use traits::IdentityStore;
pub use tree::{find_id_by_path, find_node_by_path, locate_group, locate_group_id};

#[cfg(test)]
pub(crate) mod mock;
