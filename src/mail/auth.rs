//! 凭据存储：OAuth 令牌的加载 / 刷新 / 回写
//!
//! token.json 使用 Google authorized-user 格式（access token、refresh token、
//! client id/secret、token_uri、expiry）。get_valid_token 的生命周期：
//! 有效则直接用；过期且有 refresh_token 则刷新并回写；否则走首次授权
//! （读 credentials.json，打印同意链接，本机回环端口接收跳转，换取令牌）。

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::core::AgentError;

/// Gmail 授权范围（读 + 发送）；改动后需删除 token.json 重新授权
pub const SCOPES: &str = "https://www.googleapis.com/auth/gmail.modify";

/// 过期判定的提前量（秒），避免拿到只剩几秒寿命的令牌
const EXPIRY_SKEW_SECS: i64 = 60;

/// token.json（Google authorized-user 格式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// RFC 3339；缺失视为已过期
    #[serde(default)]
    pub expiry: Option<String>,
}

impl StoredToken {
    pub fn is_expired(&self) -> bool {
        let Some(expiry) = &self.expiry else {
            return true;
        };
        match DateTime::parse_from_rfc3339(expiry) {
            Ok(t) => Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS) >= t.with_timezone(&Utc),
            Err(_) => true,
        }
    }
}

/// credentials.json（installed app 客户端凭据）
#[derive(Debug, Clone, Deserialize)]
struct ClientSecrets {
    installed: InstalledApp,
}

#[derive(Debug, Clone, Deserialize)]
struct InstalledApp {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_auth_uri")]
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// 令牌端点响应（authorization_code 与 refresh_token 两种 grant 共用）
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

/// 凭据存储：对外只暴露 get_valid_token
pub struct TokenStore {
    credentials_path: PathBuf,
    token_path: PathBuf,
    http: reqwest::Client,
}

impl TokenStore {
    pub fn new(credentials_path: PathBuf, token_path: PathBuf) -> Self {
        Self {
            credentials_path,
            token_path,
            http: reqwest::Client::new(),
        }
    }

    /// 返回一个当前有效的 access token；必要时刷新或走首次授权，并回写 token.json
    pub async fn get_valid_token(&self) -> Result<String, AgentError> {
        match self.load_token() {
            Some(tok) if !tok.is_expired() => Ok(tok.token),
            Some(tok) if tok.refresh_token.is_some() => {
                tracing::info!("access token expired, refreshing");
                let refreshed = self.refresh(&tok).await?;
                self.save_token(&refreshed)?;
                Ok(refreshed.token)
            }
            _ => {
                let tok = self.authorize().await?;
                self.save_token(&tok)?;
                Ok(tok.token)
            }
        }
    }

    fn load_token(&self) -> Option<StoredToken> {
        let data = std::fs::read_to_string(&self.token_path).ok()?;
        serde_json::from_str(&data).ok()
    }

    fn save_token(&self, token: &StoredToken) -> Result<(), AgentError> {
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| AgentError::AuthError(e.to_string()))?;
        std::fs::write(&self.token_path, json)
            .map_err(|e| AgentError::AuthError(format!("could not write token file: {}", e)))
    }

    /// refresh_token grant：换新的 access token，保留原 refresh_token
    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken, AgentError> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| AgentError::AuthError("no refresh token stored".to_string()))?;

        let resp = self
            .http
            .post(&token.token_uri)
            .form(&[
                ("client_id", token.client_id.as_str()),
                ("client_secret", token.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AgentError::AuthError(format!("token refresh request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::AuthError(format!(
                "token refresh rejected ({}): {}",
                status, body
            )));
        }

        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AgentError::AuthError(e.to_string()))?;

        Ok(StoredToken {
            token: parsed.access_token,
            refresh_token: token.refresh_token.clone(),
            expiry: Some(expiry_from_now(parsed.expires_in)),
            ..token.clone()
        })
    }

    /// 首次授权（installed app flow）：打印同意链接，回环端口等待跳转，用 code 换令牌
    async fn authorize(&self) -> Result<StoredToken, AgentError> {
        let secrets = self.load_secrets()?;
        let app = &secrets.installed;

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| AgentError::AuthError(format!("could not bind loopback port: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| AgentError::AuthError(e.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{}", port);

        let auth_url = reqwest::Url::parse_with_params(
            &app.auth_uri,
            &[
                ("client_id", app.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| AgentError::AuthError(format!("bad auth_uri in credentials: {}", e)))?;

        println!("Open this link in your browser to authorize Gmail access:");
        println!("\n  {}\n", auth_url);
        println!("Waiting for authorization...");

        let code = wait_for_code(&listener).await?;

        let resp = self
            .http
            .post(&app.token_uri)
            .form(&[
                ("client_id", app.client_id.as_str()),
                ("client_secret", app.client_secret.as_str()),
                ("code", code.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AgentError::AuthError(format!("code exchange failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::AuthError(format!(
                "code exchange rejected ({}): {}",
                status, body
            )));
        }

        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AgentError::AuthError(e.to_string()))?;

        tracing::info!("authorization complete, token saved");
        Ok(StoredToken {
            token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            token_uri: app.token_uri.clone(),
            client_id: app.client_id.clone(),
            client_secret: app.client_secret.clone(),
            scopes: vec![SCOPES.to_string()],
            expiry: Some(expiry_from_now(parsed.expires_in)),
        })
    }

    fn load_secrets(&self) -> Result<ClientSecrets, AgentError> {
        let data = std::fs::read_to_string(&self.credentials_path).map_err(|_| {
            AgentError::AuthError(format!(
                "{} not found. Please follow the setup instructions to enable the Gmail API and download your credentials.",
                self.credentials_path.display()
            ))
        })?;
        serde_json::from_str(&data)
            .map_err(|e| AgentError::AuthError(format!("invalid credentials file: {}", e)))
    }
}

fn expiry_from_now(expires_in_secs: i64) -> String {
    (Utc::now() + Duration::seconds(expires_in_secs)).to_rfc3339()
}

/// 等待浏览器跳转到回环地址，从请求行解析 code 参数，并回一个可关闭的页面
async fn wait_for_code(listener: &TcpListener) -> Result<String, AgentError> {
    let (mut stream, _) = listener
        .accept()
        .await
        .map_err(|e| AgentError::AuthError(format!("redirect listener failed: {}", e)))?;

    let mut buf = vec![0u8; 4096];
    let n = stream
        .read(&mut buf)
        .await
        .map_err(|e| AgentError::AuthError(format!("could not read redirect request: {}", e)))?;
    let request = String::from_utf8_lossy(&buf[..n]);

    let result = parse_code_from_request_line(&request);

    let page = match &result {
        Ok(_) => "Authorization complete. You can close this window.",
        Err(_) => "Authorization failed. You can close this window.",
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        page.len(),
        page
    );
    let _ = stream.write_all(response.as_bytes()).await;

    result
}

/// 从 `GET /?code=...&scope=... HTTP/1.1` 中取 code；带 error 参数视为拒绝授权
fn parse_code_from_request_line(request: &str) -> Result<String, AgentError> {
    let line = request.lines().next().unwrap_or("");
    let query = line
        .split_whitespace()
        .nth(1)
        .and_then(|path| path.split_once('?'))
        .map(|(_, q)| q)
        .unwrap_or("");

    let mut code = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("code", v)) if !v.is_empty() => code = Some(v.to_string()),
            Some(("error", v)) => {
                return Err(AgentError::AuthError(format!("authorization denied: {}", v)))
            }
            _ => {}
        }
    }
    code.ok_or_else(|| AgentError::AuthError("redirect carried no authorization code".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_token(expiry: Option<String>) -> StoredToken {
        StoredToken {
            token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_uri: default_token_uri(),
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![SCOPES.to_string()],
            expiry,
        }
    }

    #[test]
    fn test_future_expiry_is_valid() {
        let tok = sample_token(Some((Utc::now() + Duration::hours(1)).to_rfc3339()));
        assert!(!tok.is_expired());
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let tok = sample_token(Some((Utc::now() - Duration::hours(1)).to_rfc3339()));
        assert!(tok.is_expired());
    }

    #[test]
    fn test_missing_or_bad_expiry_is_expired() {
        assert!(sample_token(None).is_expired());
        assert!(sample_token(Some("not a date".to_string())).is_expired());
    }

    #[test]
    fn test_token_roundtrip_via_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let tok = sample_token(Some(Utc::now().to_rfc3339()));
        std::fs::write(&path, serde_json::to_string_pretty(&tok).unwrap()).unwrap();

        let store = TokenStore::new(dir.path().join("credentials.json"), path);
        let loaded = store.load_token().expect("token should load");
        assert_eq!(loaded.token, "access");
        assert_eq!(loaded.refresh_token.as_deref(), Some("refresh"));
    }

    #[test]
    fn test_parse_code_from_redirect() {
        let req = "GET /?code=abc123&scope=mail HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(parse_code_from_request_line(req).unwrap(), "abc123");
    }

    #[test]
    fn test_parse_denied_redirect() {
        let req = "GET /?error=access_denied HTTP/1.1\r\n\r\n";
        assert!(parse_code_from_request_line(req).is_err());
    }
}
