use std::time::Duration;

/// Client behavior knobs.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Upper bound on a single connect attempt. `None` waits as long as the
    /// connector does and needs no timer driver.
    pub connect_timeout: Option<Duration>,

    /// Refuse to send a bound command that is missing a required argument.
    /// When false the omission is reported and the command is sent anyway.
    pub strict_arguments: bool,

    /// Fail every pending command with
    /// [`ClientError::ConnectionClosed`](crate::ClientError::ConnectionClosed)
    /// when the channel goes away. When false, pending entries stay in the
    /// table until [`Client::reject_pending`](crate::Client::reject_pending).
    pub reject_pending_on_disconnect: bool,
}

impl ClientConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_strict_arguments(mut self, strict: bool) -> Self {
        self.strict_arguments = strict;
        self
    }

    pub fn with_reject_pending_on_disconnect(mut self, reject: bool) -> Self {
        self.reject_pending_on_disconnect = reject;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_permissive() {
        let config = ClientConfig::default();
        assert!(config.connect_timeout.is_none());
        assert!(!config.strict_arguments);
        assert!(!config.reject_pending_on_disconnect);
    }

    #[test]
    fn builders_set_fields() {
        let config = ClientConfig::default()
            .with_connect_timeout(Duration::from_millis(250))
            .with_strict_arguments(true)
            .with_reject_pending_on_disconnect(true);
        assert_eq!(config.connect_timeout, Some(Duration::from_millis(250)));
        assert!(config.strict_arguments);
        assert!(config.reject_pending_on_disconnect);
    }
}
