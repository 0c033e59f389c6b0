//! Connection address construction.

use crate::config::Config;

/// Build the connection URI for a configuration.
///
/// Uses `wss://` when [`Config::secure`] is set and `ws://` otherwise. The
/// `:<port>` segment is appended only for a non-zero port; a port of `0`
/// yields a bare host, leaving the port to the scheme default.
#[must_use]
pub fn socket_address(config: &Config) -> String {
    let scheme = if config.secure { "wss" } else { "ws" };
    match config.port {
        0 => format!("{scheme}://{}", config.host),
        port => format!("{scheme}://{}:{port}", config.host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_with_port() {
        let config = Config::builder().host("h").port(3000).build();
        assert_eq!(socket_address(&config), "ws://h:3000");
    }

    #[test]
    fn secure_without_port() {
        let config = Config::builder().host("h").port(0).secure(true).build();
        assert_eq!(socket_address(&config), "wss://h");
    }

    #[test]
    fn defaults_build_localhost_address() {
        assert_eq!(socket_address(&Config::default()), "ws://localhost:3000");
    }

    #[test]
    fn secure_keeps_explicit_port() {
        let config = Config::builder().host("example.com").port(8443).secure(true).build();
        assert_eq!(socket_address(&config), "wss://example.com:8443");
    }
}
