use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AlertError, AlertSender, prepare};

/// Twilio SMS credentials and addressing
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
    /// Prefix for destinations given without one
    pub country_code: String,
    pub api_base: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_phone: String::new(),
            country_code: "+27".into(),
            api_base: "https://api.twilio.com".into(),
        }
    }
}

impl fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"***")
            .field("from_phone", &self.from_phone)
            .field("country_code", &self.country_code)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl TwilioConfig {
    pub fn is_complete(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_phone.is_empty()
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        )
    }

    fn international(&self, destination: &str) -> String {
        if destination.starts_with('+') {
            destination.to_string()
        } else {
            format!("{}{}", self.country_code, destination)
        }
    }
}

/// Sends alerts as SMS through the Twilio REST API
pub struct TwilioSender {
    client: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioSender {
    pub fn new(config: TwilioConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl AlertSender for TwilioSender {
    async fn send(&self, destination: &str, message: &str) -> Result<(), AlertError> {
        let (destination, message) = prepare(destination, message)?;
        let to = self.config.international(destination);

        let response = self
            .client
            .post(self.config.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", to.as_str()), ("From", self.config.from_phone.as_str()), ("Body", message)])
            .send()
            .await?;

        let status = response.status().as_u16();
        debug!(to = %to, status, "Twilio responded");

        match status {
            200 | 201 => Ok(()),
            other => Err(AlertError::Rejected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            from_phone: "+15550000000".into(),
            api_base: server.uri(),
            ..TwilioConfig::default()
        }
    }

    #[tokio::test]
    async fn test_send_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B275551234567"))
            .and(body_string_contains("Body=hello+there"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let sender = TwilioSender::new(config(&server)).unwrap();
        sender.send("5551234567", "hello there").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let sender = TwilioSender::new(config(&server)).unwrap();
        assert!(matches!(
            sender.send("5551234567", "hello").await,
            Err(AlertError::Rejected(401))
        ));
    }

    #[tokio::test]
    async fn test_invalid_destination_never_calls_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let sender = TwilioSender::new(config(&server)).unwrap();
        assert!(matches!(
            sender.send("123", "hello").await,
            Err(AlertError::InvalidDestination(_))
        ));
    }

    #[test]
    fn test_debug_masks_token() {
        let config = TwilioConfig { auth_token: "secret".into(), ..TwilioConfig::default() };
        assert!(!format!("{config:?}").contains("secret"));
        assert!(!config.is_complete());
    }
}
