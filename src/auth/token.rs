use base64::prelude::{Engine as _, BASE64_STANDARD};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::error::BridgeError;
use crate::storage::TokenCache;
use crate::timeline::read_limited_bytes;

/// Cache scope the token is stored under.
pub const TOKEN_SCOPE: &str = "TwitterApiBridge";
/// Cache key of the single cached value.
pub const TOKEN_KEY: &str = "token";

/// Token responses are a few hundred bytes; anything bigger is not one.
const MAX_TOKEN_RESPONSE: usize = 64 * 1024;

/// API consumer key and secret.
///
/// Empty strings are treated as absent. Debug output never shows the values.
#[derive(Debug, Default)]
pub struct Credentials {
    api_key: Option<SecretString>,
    api_secret: Option<SecretString>,
}

impl Credentials {
    pub fn new(api_key: Option<String>, api_secret: Option<String>) -> Self {
        let secret = |value: Option<String>| {
            value
                .filter(|v| !v.is_empty())
                .map(SecretString::from)
        };
        Self {
            api_key: secret(api_key),
            api_secret: secret(api_secret),
        }
    }

    /// Both parts, or `MissingCredentials` if either is absent.
    pub fn expose(&self) -> Result<(&str, &str), BridgeError> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Ok((key.expose_secret(), secret.expose_secret())),
            _ => Err(BridgeError::MissingCredentials),
        }
    }

    /// `Authorization` header value for the client-credentials exchange:
    /// `Basic base64(urlencode(key) ":" urlencode(secret))`.
    fn basic_authorization(&self) -> Result<String, BridgeError> {
        let (key, secret) = self.expose()?;
        let pair = format!(
            "{}:{}",
            urlencoding::encode(key),
            urlencoding::encode(secret)
        );
        Ok(format!("Basic {}", BASE64_STANDARD.encode(pair)))
    }
}

/// Opaque application-only bearer token.
#[derive(Debug)]
pub struct BearerToken(SecretString);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// `Authorization` header value for API requests.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Acquires the bearer token, consulting the cache before the exchange endpoint.
///
/// A cached token is returned without validation. There is no expiry tracking:
/// a revoked token keeps failing downstream until the cache entry is removed
/// (see `tweetfeed --forget-token`).
pub struct TokenManager<'a> {
    client: &'a reqwest::Client,
    cache: &'a dyn TokenCache,
    token_url: String,
    timeout: Duration,
}

impl<'a> TokenManager<'a> {
    pub fn new(
        client: &'a reqwest::Client,
        cache: &'a dyn TokenCache,
        token_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            token_url: token_url.into(),
            timeout,
        }
    }

    /// Returns the cached token, or exchanges the credentials for a new one.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::MissingCredentials`] - key or secret absent; no I/O happens
    /// - [`BridgeError::AuthFailure`] - the exchange failed or returned no bearer token
    ///
    /// Cache failures are logged and never fail the call: a failed read is a
    /// miss, a failed write still returns the fresh token.
    pub async fn get_token(&self, credentials: &Credentials) -> Result<BearerToken, BridgeError> {
        let authorization = credentials.basic_authorization()?;

        match self.cache.get(TOKEN_SCOPE, TOKEN_KEY).await {
            Ok(Some(token)) if !token.is_empty() => {
                tracing::debug!("Using cached bearer token");
                return Ok(BearerToken::new(token));
            }
            Ok(_) => tracing::debug!("No cached bearer token"),
            Err(e) => {
                tracing::warn!(error = %e, "Token cache read failed, requesting a new token");
            }
        }

        let token = self.exchange(&authorization).await?;

        // Overlapping runs may both get here; the cache upserts, last write wins.
        if let Err(e) = self.cache.set(TOKEN_SCOPE, TOKEN_KEY, token.expose()).await {
            tracing::warn!(error = %e, "Failed to cache bearer token");
        }

        Ok(token)
    }

    async fn exchange(&self, authorization: &str) -> Result<BearerToken, BridgeError> {
        let request = self
            .client
            .post(self.token_url.as_str())
            .header(AUTHORIZATION, authorization)
            .header(
                CONTENT_TYPE,
                "application/x-www-form-urlencoded;charset=UTF-8",
            )
            .body("grant_type=client_credentials");

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| BridgeError::AuthFailure("token request timed out".to_string()))?
            .map_err(|e| BridgeError::AuthFailure(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(BridgeError::AuthFailure(format!(
                "token endpoint returned status {}",
                response.status().as_u16()
            )));
        }

        let bytes = read_limited_bytes(response, MAX_TOKEN_RESPONSE)
            .await
            .map_err(|e| BridgeError::AuthFailure(e.to_string()))?;

        let reply: TokenReply = serde_json::from_slice(&bytes)
            .map_err(|_| BridgeError::AuthFailure("token response is not JSON".to_string()))?;

        match reply {
            TokenReply {
                token_type: Some(kind),
                access_token: Some(token),
            } if kind == "bearer" && !token.is_empty() => {
                tracing::info!("Obtained new bearer token");
                Ok(BearerToken::new(token))
            }
            _ => Err(BridgeError::AuthFailure(
                "token response carries no bearer token".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCache;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials::new(Some("key".into()), Some("secret".into()))
    }

    fn manager<'a>(
        client: &'a reqwest::Client,
        cache: &'a MemoryCache,
        server: &MockServer,
    ) -> TokenManager<'a> {
        TokenManager::new(
            client,
            cache,
            format!("{}/oauth2/token", server.uri()),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_basic_authorization_encoding() {
        // "key:secret" -> a2V5OnNlY3JldA==
        assert_eq!(
            credentials().basic_authorization().unwrap(),
            "Basic a2V5OnNlY3JldA=="
        );

        // Reserved characters are percent-encoded before base64: "a%2Bb:c%2Fd"
        let special = Credentials::new(Some("a+b".into()), Some("c/d".into()));
        assert_eq!(
            special.basic_authorization().unwrap(),
            format!("Basic {}", BASE64_STANDARD.encode("a%2Bb:c%2Fd"))
        );
    }

    #[test]
    fn test_empty_parts_are_missing() {
        let creds = Credentials::new(Some(String::new()), Some("secret".into()));
        assert!(matches!(creds.expose(), Err(BridgeError::MissingCredentials)));

        let creds = Credentials::new(Some("key".into()), None);
        assert!(matches!(creds.expose(), Err(BridgeError::MissingCredentials)));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials::new(Some("my-key-value".into()), Some("my-secret-value".into()));
        let output = format!("{:?} {:?}", creds, BearerToken::new("tok-123"));
        assert!(!output.contains("my-key-value"));
        assert!(!output.contains("my-secret-value"));
        assert!(!output.contains("tok-123"));
        assert!(output.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_exchange_success_caches_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(header("Authorization", "Basic a2V5OnNlY3JldA=="))
            .and(body_string("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"token_type":"bearer","access_token":"AAAA%2FAAA"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let cache = MemoryCache::new();
        let token = manager(&client, &cache, &server)
            .get_token(&credentials())
            .await
            .unwrap();

        assert_eq!(token.expose(), "AAAA%2FAAA");
        assert_eq!(
            cache.get(TOKEN_SCOPE, TOKEN_KEY).await.unwrap().as_deref(),
            Some("AAAA%2FAAA")
        );
    }

    #[tokio::test]
    async fn test_cache_hit_skips_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let cache = MemoryCache::new();
        cache.set(TOKEN_SCOPE, TOKEN_KEY, "cached").await.unwrap();

        let token = manager(&client, &cache, &server)
            .get_token(&credentials())
            .await
            .unwrap();
        assert_eq!(token.expose(), "cached");
    }

    #[tokio::test]
    async fn test_second_call_uses_cached_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"token_type":"bearer","access_token":"fresh"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let cache = MemoryCache::new();
        let manager = manager(&client, &cache, &server);

        manager.get_token(&credentials()).await.unwrap();
        let again = manager.get_token(&credentials()).await.unwrap();
        assert_eq!(again.expose(), "fresh");
    }

    #[tokio::test]
    async fn test_missing_access_token_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"token_type":"bearer"}"#))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let cache = MemoryCache::new();
        let result = manager(&client, &cache, &server)
            .get_token(&credentials())
            .await;

        assert!(matches!(result, Err(BridgeError::AuthFailure(_))));
        assert!(cache.get(TOKEN_SCOPE, TOKEN_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_token_type_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"token_type":"mac","access_token":"x"}"#),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let cache = MemoryCache::new();
        let result = manager(&client, &cache, &server)
            .get_token(&credentials())
            .await;
        assert!(matches!(result, Err(BridgeError::AuthFailure(_))));
    }

    #[tokio::test]
    async fn test_http_error_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                r#"{"errors":[{"code":99,"message":"Unable to verify your credentials"}]}"#,
            ))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let cache = MemoryCache::new();
        match manager(&client, &cache, &server)
            .get_token(&credentials())
            .await
        {
            Err(BridgeError::AuthFailure(reason)) => assert!(reason.contains("403")),
            other => panic!("Expected AuthFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_reply_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let cache = MemoryCache::new();
        let result = manager(&client, &cache, &server)
            .get_token(&credentials())
            .await;
        assert!(matches!(result, Err(BridgeError::AuthFailure(_))));
    }

    #[tokio::test]
    async fn test_missing_credentials_short_circuits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let cache = MemoryCache::new();
        cache.set(TOKEN_SCOPE, TOKEN_KEY, "cached").await.unwrap();

        let result = manager(&client, &cache, &server)
            .get_token(&Credentials::new(Some("key".into()), Some(String::new())))
            .await;
        assert!(matches!(result, Err(BridgeError::MissingCredentials)));
    }
}
