use anyhow::{bail, Context, Result};
use base64::Engine;
use rand::Rng;
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::info;

/// Random value for the OAuth `state` parameter.
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..24).map(|_| rng.gen::<u8>()).collect();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&bytes)
}

#[derive(Debug, PartialEq, Eq)]
pub struct AuthResult {
    pub code: String,
    pub state: String,
}

/// `host:port` to listen on for the given redirect URI.
pub fn listen_addr(redirect_uri: &str) -> Result<String> {
    let rest = redirect_uri
        .strip_prefix("http://")
        .context("Redirect URI must be a plain http:// loopback address")?;
    let authority = rest.split('/').next().unwrap_or(rest);
    if authority.is_empty() {
        bail!("Redirect URI has no host: {redirect_uri}");
    }
    if authority.contains(':') {
        Ok(authority.to_string())
    } else {
        Ok(format!("{authority}:80"))
    }
}

/// Pulls `code` and `state` out of the first line of the redirect request.
pub fn parse_redirect(request_line: &str) -> Result<AuthResult> {
    let query = request_line
        .split_whitespace()
        .nth(1)
        .and_then(|path| path.split_once('?').map(|(_, q)| q))
        .unwrap_or("");

    let params: HashMap<&str, String> = query
        .split('&')
        .filter_map(|kv| {
            let (key, value) = kv.split_once('=')?;
            let value = urlencoding::decode(value).ok()?.into_owned();
            Some((key, value))
        })
        .collect();

    if let Some(error) = params.get("error") {
        bail!("Spotify authorization failed: {error}");
    }
    let code = params.get("code").context("No code in redirect")?.clone();
    let state = params.get("state").cloned().unwrap_or_default();
    Ok(AuthResult { code, state })
}

/// Starts a local HTTP listener on the redirect URI's address and waits for
/// the Spotify redirect.
pub async fn wait_for_auth_code(redirect_uri: &str) -> Result<AuthResult> {
    let addr = listen_addr(redirect_uri)?;
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr} for OAuth redirect"))?;

    info!("Waiting for Spotify auth redirect on {redirect_uri} ...");

    let (mut stream, _) = listener.accept().await?;
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let result = parse_redirect(request.lines().next().unwrap_or(""));

    let body = if result.is_ok() {
        "tasteseed is authorized. You can close this tab and return to your terminal."
    } else {
        "tasteseed could not be authorized. Check your terminal for details."
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr_from_redirect() {
        assert_eq!(
            listen_addr("http://127.0.0.1:8989/login").unwrap(),
            "127.0.0.1:8989"
        );
        assert_eq!(listen_addr("http://localhost/cb").unwrap(), "localhost:80");
        assert!(listen_addr("https://example.com/cb").is_err());
    }

    #[test]
    fn test_parse_redirect_decodes_params() {
        let result = parse_redirect("GET /login?code=AQB%2Fx&state=abc HTTP/1.1").unwrap();
        assert_eq!(
            result,
            AuthResult {
                code: "AQB/x".to_string(),
                state: "abc".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_redirect_reports_denied() {
        let err = parse_redirect("GET /login?error=access_denied&state=abc HTTP/1.1").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn test_state_is_url_safe() {
        let state = generate_state();
        assert_eq!(state.len(), 32);
        assert!(state
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
