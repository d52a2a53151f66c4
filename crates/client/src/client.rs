//! Controller API Client
//!
//! The controller exposes a single form-encoded endpoint, `/v1/api`. Every
//! call names an `action` and carries the session id (`CID`) obtained from
//! `login`. Responses share one envelope: `{"return": bool, "reason": ...,
//! "results": ...}`.

use std::fmt;
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Connection settings for a controller
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Controller address, host or host:port
    pub controller_ip: String,

    /// Account user name
    pub username: String,

    /// Account password
    #[serde(skip_serializing)]
    pub password: String,

    /// Verify the controller's TLS certificate
    pub verify_ssl_certificate: bool,

    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            controller_ip: String::new(),
            username: String::new(),
            password: String::new(),
            // Controllers ship with self-signed certificates
            verify_ssl_certificate: false,
            timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("controller_ip", &self.controller_ip)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("verify_ssl_certificate", &self.verify_ssl_certificate)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Check that the settings needed to log in are present
    pub fn validate(&self) -> Result<()> {
        if self.controller_ip.is_empty() {
            return Err(Error::InvalidConfig("controller_ip is required".to_string()));
        }
        if self.username.is_empty() {
            return Err(Error::InvalidConfig("username is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(Error::InvalidConfig("password is required".to_string()));
        }
        Ok(())
    }

    /// URL of the controller API endpoint
    pub fn api_url(&self) -> String {
        format!("https://{}/v1/api", self.controller_ip)
    }
}

/// Response envelope shared by every controller action
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "return")]
    pub success: bool,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub results: Value,

    /// Only set by `login`
    #[serde(rename = "CID", default)]
    pub cid: Option<String>,
}

impl ApiResponse {
    /// Turn a `return: false` envelope into an error
    pub fn check(self, action: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::Api {
                action: action.to_string(),
                reason: self.reason,
            })
        }
    }

    /// Decode the value stored under `results.<key>`
    pub fn results_field<T: DeserializeOwned>(&self, action: &str, key: &str) -> Result<T> {
        match self.results.get(key) {
            Some(value) if !value.is_null() => Ok(serde_json::from_value(value.clone())?),
            _ => Err(Error::MissingResults {
                action: action.to_string(),
            }),
        }
    }
}

/// Form body of an authenticated call
#[derive(Serialize)]
struct ActionForm<'a, T: Serialize + ?Sized> {
    #[serde(rename = "CID")]
    cid: &'a str,
    action: &'a str,
    #[serde(flatten)]
    payload: &'a T,
}

/// Client for the controller API
///
/// Cheap to share behind an `Arc`; the session id is the only mutable part.
/// An expired session is renewed once per call with the stored credentials.
pub struct Client {
    http: reqwest::Client,
    api_url: String,
    controller_ip: String,
    username: String,
    password: String,
    cid: RwLock<Option<String>>,
}

impl Client {
    /// Build a client without logging in
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_ssl_certificate)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url(),
            controller_ip: config.controller_ip.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            cid: RwLock::new(None),
        })
    }

    /// Build a client and open a session
    pub async fn login(config: &ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.authenticate().await?;
        Ok(client)
    }

    /// Open a new session, replacing the current session id
    pub async fn authenticate(&self) -> Result<()> {
        let form = [
            ("action", "login"),
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];
        let response = self.send("login", &form).await?;

        let cid = response
            .cid
            .filter(|cid| !cid.is_empty())
            .ok_or_else(|| Error::Api {
                action: "login".to_string(),
                reason: "no CID in login response".to_string(),
            })?;
        *self.cid.write() = Some(cid);

        info!("Logged in to controller at {}", self.controller_ip);
        Ok(())
    }

    /// Current session id
    pub fn cid(&self) -> Result<String> {
        self.cid.read().clone().ok_or(Error::NotLoggedIn)
    }

    /// POST `payload` for `action` with the session id attached
    pub async fn post_api<T>(&self, action: &str, payload: &T) -> Result<ApiResponse>
    where
        T: Serialize + ?Sized + Sync,
    {
        match self.post_with_session(action, payload).await {
            Err(e) if e.is_session_expired() => {
                warn!(action, "Controller session expired, logging in again");
                self.authenticate().await?;
                self.post_with_session(action, payload).await
            }
            result => result,
        }
    }

    async fn post_with_session<T>(&self, action: &str, payload: &T) -> Result<ApiResponse>
    where
        T: Serialize + ?Sized + Sync,
    {
        let cid = self.cid()?;
        let form = ActionForm {
            cid: &cid,
            action,
            payload,
        };
        self.send(action, &form).await
    }

    async fn send<T>(&self, action: &str, form: &T) -> Result<ApiResponse>
    where
        T: Serialize + ?Sized,
    {
        debug!(action, "POST {}", self.api_url);

        let response = self
            .http
            .post(&self.api_url)
            .form(form)
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse = response.json().await?;
        body.check(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ClientConfig {
        ClientConfig {
            controller_ip: "10.0.0.1".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());

        let missing_ip = ClientConfig {
            controller_ip: String::new(),
            ..config()
        };
        assert!(matches!(missing_ip.validate(), Err(Error::InvalidConfig(_))));

        let missing_password = ClientConfig {
            password: String::new(),
            ..config()
        };
        assert!(matches!(
            missing_password.validate(),
            Err(Error::InvalidConfig(msg)) if msg.contains("password")
        ));
    }

    #[test]
    fn test_config_debug_hides_password() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("10.0.0.1"));
    }

    #[test]
    fn test_api_url() {
        assert_eq!(config().api_url(), "https://10.0.0.1/v1/api");
    }

    #[test]
    fn test_failed_envelope_is_api_error() {
        let response: ApiResponse = serde_json::from_value(json!({
            "return": false,
            "reason": "Gateway tgw-1 is down",
        }))
        .unwrap();

        match response.check("attach_cloudwan_device_to_transit_gateway") {
            Err(Error::Api { action, reason }) => {
                assert_eq!(action, "attach_cloudwan_device_to_transit_gateway");
                assert_eq!(reason, "Gateway tgw-1 is down");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_login_envelope_carries_cid() {
        let response: ApiResponse = serde_json::from_value(json!({
            "return": true,
            "results": "User login:admin in account:admin has been authorized successfully",
            "CID": "abc123",
        }))
        .unwrap();

        let response = response.check("login").unwrap();
        assert_eq!(response.cid.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_results_field() {
        let response: ApiResponse = serde_json::from_value(json!({
            "return": true,
            "results": { "connections": { "name": "conn-1" } },
        }))
        .unwrap();

        let value: Value = response.results_field("get", "connections").unwrap();
        assert_eq!(value["name"], "conn-1");

        assert!(matches!(
            response.results_field::<Value>("get", "missing"),
            Err(Error::MissingResults { .. })
        ));
    }

    #[test]
    fn test_action_form_flattens_payload() {
        let payload = json!({ "connection_name": "conn-1" });
        let form = ActionForm {
            cid: "abc123",
            action: "detach_cloudwan_device_from_cloud",
            payload: &payload,
        };

        let encoded = serde_json::to_value(&form).unwrap();
        assert_eq!(
            encoded,
            json!({
                "CID": "abc123",
                "action": "detach_cloudwan_device_from_cloud",
                "connection_name": "conn-1",
            })
        );
    }

    #[test]
    fn test_new_client_has_no_session() {
        let client = Client::new(&config()).unwrap();
        assert!(matches!(client.cid(), Err(Error::NotLoggedIn)));
        assert_eq!(client.username, "admin");
        assert_eq!(client.password, "secret");
    }

    #[test]
    fn test_expired_session_envelope_is_recognised() {
        let response: ApiResponse = serde_json::from_value(json!({
            "return": false,
            "reason": "CID is invalid or expired.",
        }))
        .unwrap();

        let err = response.check("get_site2cloud_conn_detail").unwrap_err();
        assert!(err.is_session_expired());
    }
}
