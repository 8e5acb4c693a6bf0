//! Local Node Identity
//!
//! The origin label attached to every observation. `NODE_NAME` wins when set
//! (usually the pod's node name, injected through the downward API); otherwise
//! the host name is used, which inside a pod is only the pod name.

use thiserror::Error;

/// Environment variable overriding the host name
pub const NODE_NAME_ENV: &str = "NODE_NAME";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("host name is not valid UTF-8: {0:?}")]
    InvalidHostname(std::ffi::OsString),
    #[error("host name is empty")]
    EmptyHostname,
}

/// Resolve the local node name from the environment.
pub fn resolve_node_name() -> Result<String, IdentityError> {
    resolve_node_name_from(std::env::var(NODE_NAME_ENV).ok())
}

/// Resolve the local node name from an explicit override.
///
/// An empty override counts as unset.
pub fn resolve_node_name_from(override_name: Option<String>) -> Result<String, IdentityError> {
    if let Some(name) = override_name.filter(|n| !n.is_empty()) {
        return Ok(name);
    }

    let hostname = gethostname::gethostname()
        .into_string()
        .map_err(IdentityError::InvalidHostname)?;

    if hostname.is_empty() {
        return Err(IdentityError::EmptyHostname);
    }

    Ok(hostname)
}
