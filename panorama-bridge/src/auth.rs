//! Access control for the bridge's HTTP surface
//!
//! Only loopback peers are served at all; remote access is expected to come
//! through a tunnel or reverse proxy on the same host. WebSocket upgrades
//! additionally need the bridge token and, when configured, a username and
//! password.

use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use axum::extract::{ConnectInfo, Request};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use tracing::{info, warn};

use panorama_utils::{ensure_dir, PanoramaError, Result};

/// Random bytes in a bridge token
const TOKEN_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("only loopback connections are accepted")]
    NotLoopback,

    #[error("missing or invalid token")]
    BadToken,

    #[error("missing or invalid username/password")]
    BadCredentials,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::NotLoopback => StatusCode::FORBIDDEN,
            AuthError::BadToken | AuthError::BadCredentials => StatusCode::UNAUTHORIZED,
        };
        let mut response = (status, self.to_string()).into_response();
        if matches!(self, AuthError::BadCredentials) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Basic realm=\"panorama\""),
            );
        }
        response
    }
}

impl From<AuthError> for PanoramaError {
    fn from(e: AuthError) -> Self {
        PanoramaError::Unauthorized(e.to_string())
    }
}

/// Reject any request whose peer is not on a loopback address
pub async fn require_loopback(request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    match peer {
        Some(addr) if addr.ip().is_loopback() => next.run(request).await,
        other => {
            warn!(peer = ?other, path = %request.uri().path(), "rejected non-loopback request");
            AuthError::NotLoopback.into_response()
        }
    }
}

/// Read the token at `path`, creating it on first start
pub fn load_or_create_token(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let token = content.trim().to_string();
            if is_valid_token(&token) {
                return Ok(token);
            }
            warn!(path = %path.display(), "token file is malformed, regenerating");
            std::fs::remove_file(path).map_err(|e| PanoramaError::FileWrite {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(PanoramaError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }

    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let write = |path: &Path| -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(token.as_bytes())?;
        file.write_all(b"\n")
    };
    write(path).map_err(|e| PanoramaError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!(path = %path.display(), "generated bridge token");
    Ok(token)
}

fn is_valid_token(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// What a WebSocket upgrade must present
#[derive(Debug, Clone)]
pub struct Credentials {
    token: String,
    basic: Option<(String, String)>,
}

impl Credentials {
    pub fn new(token: impl Into<String>, basic: Option<(&str, &str)>) -> Self {
        Self {
            token: token.into(),
            basic: basic.map(|(u, p)| (u.to_string(), p.to_string())),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Check a request's headers and query parameters
    pub fn authorize(
        &self,
        headers: &HeaderMap,
        query: &HashMap<String, String>,
    ) -> std::result::Result<(), AuthError> {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = authorization
            .and_then(|v| v.strip_prefix("Bearer "))
            .or_else(|| query.get("token").map(String::as_str));
        match token {
            Some(token) if constant_time_eq(token.trim().as_bytes(), self.token.as_bytes()) => {}
            _ => return Err(AuthError::BadToken),
        }

        let Some((user, pass)) = &self.basic else {
            return Ok(());
        };
        let offered = authorization
            .and_then(|v| v.strip_prefix("Basic "))
            .and_then(decode_basic)
            .or_else(|| Some((query.get("user")?.clone(), query.get("password")?.clone())));
        match offered {
            Some((u, p))
                if constant_time_eq(u.as_bytes(), user.as_bytes())
                    & constant_time_eq(p.as_bytes(), pass.as_bytes()) =>
            {
                Ok(())
            }
            _ => Err(AuthError::BadCredentials),
        }
    }
}

fn decode_basic(encoded: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::os::unix::fs::PermissionsExt;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    // ==================== Token file ====================

    #[test]
    fn test_token_created_with_private_mode_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("bridge.token");

        let first = load_or_create_token(&path).unwrap();
        assert_eq!(first.len(), 64);
        assert!(is_valid_token(&first));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let second = load_or_create_token(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_token_is_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.token");
        std::fs::write(&path, "short\n").unwrap();

        let token = load_or_create_token(&path).unwrap();
        assert!(is_valid_token(&token));
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), token);
    }

    // ==================== Token check ====================

    #[test]
    fn test_bearer_header_or_query_token() {
        let creds = Credentials::new("abc", None);
        assert!(creds.authorize(&bearer("abc"), &HashMap::new()).is_ok());
        assert!(creds
            .authorize(&HeaderMap::new(), &query(&[("token", "abc")]))
            .is_ok());
        assert!(matches!(
            creds.authorize(&bearer("abd"), &HashMap::new()),
            Err(AuthError::BadToken)
        ));
        assert!(matches!(
            creds.authorize(&HeaderMap::new(), &HashMap::new()),
            Err(AuthError::BadToken)
        ));
    }

    // ==================== Username / password ====================

    #[test]
    fn test_basic_header_with_query_token() {
        let creds = Credentials::new("abc", Some(("me", "pw")));
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode("me:pw");
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap(),
        );
        assert!(creds.authorize(&headers, &query(&[("token", "abc")])).is_ok());
    }

    #[test]
    fn test_query_credentials() {
        let creds = Credentials::new("abc", Some(("me", "pw")));
        let ok = query(&[("token", "abc"), ("user", "me"), ("password", "pw")]);
        assert!(creds.authorize(&HeaderMap::new(), &ok).is_ok());

        let wrong = query(&[("token", "abc"), ("user", "me"), ("password", "nope")]);
        assert!(matches!(
            creds.authorize(&HeaderMap::new(), &wrong),
            Err(AuthError::BadCredentials)
        ));

        let token_only = query(&[("token", "abc")]);
        assert!(matches!(
            creds.authorize(&HeaderMap::new(), &token_only),
            Err(AuthError::BadCredentials)
        ));
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AuthError::NotLoopback.into_response().status(),
            StatusCode::FORBIDDEN
        );
        let response = AuthError::BadCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"same", b"same"));
        assert!(!constant_time_eq(b"same", b"diff"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
