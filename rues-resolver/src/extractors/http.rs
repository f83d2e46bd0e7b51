//! Shared HTTP plumbing for the source clients

use crate::types::SourceError;
use reqwest::{Client, RequestBuilder, Response};
use rues_common::config::SourcesConfig;
use tracing::debug;

/// Build the client shared by every source: configured user agent and timeout
pub fn build_client(config: &SourcesConfig) -> Result<Client, SourceError> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout())
        .build()
        .map_err(|e| SourceError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Send a request and reject non-success statuses
pub async fn send_checked(request: RequestBuilder) -> Result<Response, SourceError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let url = response.url().to_string();
        debug!(%url, status = status.as_u16(), "Source returned non-success status");
        return Err(SourceError::Status {
            status: status.as_u16(),
            url,
        });
    }
    Ok(response)
}

/// Substitute the registry key into a `{}` URL template
pub fn fill_template(template: &str, key: &str) -> String {
    template.replacen(rues_common::config::KEY_PLACEHOLDER, key, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_substitution() {
        assert_eq!(
            fill_template("https://api.example/DetalleRM/{}", "050000000321"),
            "https://api.example/DetalleRM/050000000321"
        );
        assert_eq!(
            fill_template("https://api.example/x?id={}", "01"),
            "https://api.example/x?id=01"
        );
    }

    #[test]
    fn client_builds_from_defaults() {
        assert!(build_client(&SourcesConfig::default()).is_ok());
    }
}
