//! Provider configuration
//!
//! Values come from the provider block, falling back to `AVIATRIX_*`
//! environment variables for anything the block leaves unset.

use std::fmt;

use aviatrix_client::ClientConfig;

use crate::state::DynamicValue;

pub const ENV_CONTROLLER_IP: &str = "AVIATRIX_CONTROLLER_IP";
pub const ENV_USERNAME: &str = "AVIATRIX_USERNAME";
pub const ENV_PASSWORD: &str = "AVIATRIX_PASSWORD";

/// Provider block settings
#[derive(Clone, Default, PartialEq)]
pub struct ProviderConfig {
    pub controller_ip: String,
    pub username: String,
    pub password: String,
    pub verify_ssl_certificate: bool,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("controller_ip", &self.controller_ip)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("verify_ssl_certificate", &self.verify_ssl_certificate)
            .finish()
    }
}

impl ProviderConfig {
    /// Read the provider block, using the process environment as fallback
    pub fn from_value(value: &DynamicValue) -> Self {
        Self::from_value_with_env(value, |key| std::env::var(key).ok())
    }

    /// Read the provider block with an explicit environment lookup
    pub fn from_value_with_env<F>(value: &DynamicValue, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_attr = |key: &str, env_key: &str| -> String {
            value
                .get(key)
                .and_then(|v| v.as_string())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| env(env_key))
                .unwrap_or_default()
        };

        Self {
            controller_ip: string_attr("controller_ip", ENV_CONTROLLER_IP),
            username: string_attr("username", ENV_USERNAME),
            password: string_attr("password", ENV_PASSWORD),
            verify_ssl_certificate: value
                .get("verify_ssl_certificate")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }
    }

    /// Settings for the controller client
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            controller_ip: self.controller_ip.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            verify_ssl_certificate: self.verify_ssl_certificate,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::make_state;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_block_values() {
        let block = make_state(vec![
            ("controller_ip", "10.1.1.1".into()),
            ("username", "admin".into()),
            ("password", "secret".into()),
            ("verify_ssl_certificate", true.into()),
        ]);

        let config = ProviderConfig::from_value_with_env(&block, no_env);
        assert_eq!(config.controller_ip, "10.1.1.1");
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "secret");
        assert!(config.verify_ssl_certificate);
    }

    #[test]
    fn test_environment_fallback() {
        let block = make_state(vec![
            ("controller_ip", "".into()),
            ("username", "operator".into()),
            ("password", DynamicValue::Null),
        ]);
        let env = |key: &str| match key {
            ENV_CONTROLLER_IP => Some("10.2.2.2".to_string()),
            ENV_USERNAME => Some("ignored".to_string()),
            ENV_PASSWORD => Some("from-env".to_string()),
            _ => None,
        };

        let config = ProviderConfig::from_value_with_env(&block, env);
        assert_eq!(config.controller_ip, "10.2.2.2");
        assert_eq!(config.username, "operator");
        assert_eq!(config.password, "from-env");
        assert!(!config.verify_ssl_certificate);
    }

    #[test]
    fn test_client_config() {
        let config = ProviderConfig {
            controller_ip: "10.1.1.1".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            verify_ssl_certificate: false,
        };

        let client_config = config.client_config();
        assert_eq!(client_config.api_url(), "https://10.1.1.1/v1/api");
        assert!(client_config.validate().is_ok());
        assert!(ProviderConfig::default().client_config().validate().is_err());
    }
}
