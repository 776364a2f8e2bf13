//! Error types for the model layer.

/// Errors produced while interpreting model data.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The lobby carries no initial configuration payload.
    #[error("lobby for room {0} has no initial config")]
    MissingInitialConfig(crate::RoomId),

    /// The lobby's initial configuration could not be decoded into the
    /// requested shape.
    #[cfg(feature = "json")]
    #[error("lobby initial config is malformed: {0}")]
    MalformedInitialConfig(#[source] serde_json::Error),

    /// A region name did not match any known Hathora region.
    #[error("unknown region: {0}")]
    UnknownRegion(String),
}

/// Errors from turning a room's connection info into a socket address.
///
/// `NoExposedPort` is the "not found" case: the control plane has not
/// given this room an address. The other variants mean an address exists
/// but could not be resolved.
#[derive(Debug, thiserror::Error)]
pub enum AddrError {
    /// The room has no connection info or no exposed port.
    #[error("room {0} has no exposed port")]
    NoExposedPort(crate::RoomId),

    /// Host name resolution failed.
    #[error("failed to resolve host {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Resolution succeeded but returned no addresses.
    #[error("host {0} resolved to no addresses")]
    NoAddress(String),
}
