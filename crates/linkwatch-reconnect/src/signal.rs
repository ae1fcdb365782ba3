use linkwatch_quality::ConnectionStatus;

/// A connectivity change reported by the host platform.
///
/// Pushed with [`ReconnectionManager::handle_signal`](crate::ReconnectionManager::handle_signal)
/// or delivered through a `tokio::sync::broadcast` channel registered on the
/// manager builder.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectivitySignal {
    /// The platform reports the connection gone. Starts a reconnection cycle.
    ConnectionLost,
    /// The platform reports the connection back. Ends a running cycle as a success.
    Reconnected,
    /// A full status update. Offline starts a cycle; online while
    /// reconnecting ends it as a success.
    ConnectionChanged(ConnectionStatus),
}
