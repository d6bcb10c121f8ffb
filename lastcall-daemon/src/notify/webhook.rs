use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Embed, MessageRef, MessageTransport, NotifyError, StatusMessage};
use crate::config::NotifyConfig;

/// Webhook transport following the Discord execute / edit / delete message API
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: reqwest::Client,
    url: String,
    username: String,
    avatar_url: Option<String>,
}

#[derive(Serialize)]
struct PostPayload<'a> {
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
    content: &'a str,
    embeds: [&'a Embed; 1],
}

#[derive(Serialize)]
struct PatchPayload<'a> {
    content: &'a str,
    embeds: [&'a Embed; 1],
}

#[derive(Deserialize)]
struct CreatedMessage {
    #[serde(default)]
    id: Option<String>,
}

impl WebhookTransport {
    pub fn new(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            url: config.webhook_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            avatar_url: config.avatar_url.clone(),
        })
    }

    /// Execute URL; `wait=true` makes the endpoint answer with the created message
    fn post_url(&self) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}wait=true", self.url, separator)
    }

    fn message_url(&self, id: &MessageRef) -> String {
        match self.url.split_once('?') {
            Some((base, query)) => format!("{}/messages/{}?{}", base, id, query),
            None => format!("{}/messages/{}", self.url, id),
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(NotifyError::Status {
        status: status.as_u16(),
        body,
    })
}

impl MessageTransport for WebhookTransport {
    async fn post(&self, message: &StatusMessage) -> Result<MessageRef, NotifyError> {
        let payload = PostPayload {
            username: &self.username,
            avatar_url: self.avatar_url.as_deref(),
            content: &message.content,
            embeds: [&message.embed],
        };

        let response = self.client.post(self.post_url()).json(&payload).send().await?;
        let created: CreatedMessage = ensure_success(response).await?.json().await?;

        match created.id {
            Some(id) if !id.is_empty() => Ok(MessageRef::new(id)),
            _ => Err(NotifyError::MissingId),
        }
    }

    async fn patch(&self, id: &MessageRef, message: &StatusMessage) -> Result<(), NotifyError> {
        let payload = PatchPayload {
            content: &message.content,
            embeds: [&message.embed],
        };

        let response = self
            .client
            .patch(self.message_url(id))
            .json(&payload)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(NotifyError::Gone(id.clone()));
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete(&self, id: &MessageRef) -> Result<(), NotifyError> {
        let response = self.client.delete(self.message_url(id)).send().await?;

        // Someone already removed it by hand
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ServerDetails;
    use chrono::Utc;

    fn transport(url: &str) -> WebhookTransport {
        let config = NotifyConfig {
            webhook_url: url.to_string(),
            avatar_url: Some("https://example.com/avatar.png".to_string()),
            ..NotifyConfig::default()
        };
        WebhookTransport::new(&config).unwrap()
    }

    #[test]
    fn test_post_url_requests_created_message() {
        let t = transport("https://discord.com/api/webhooks/1/abc/");
        assert_eq!(t.post_url(), "https://discord.com/api/webhooks/1/abc?wait=true");

        let t = transport("https://discord.com/api/webhooks/1/abc?thread_id=9");
        assert_eq!(
            t.post_url(),
            "https://discord.com/api/webhooks/1/abc?thread_id=9&wait=true"
        );
    }

    #[test]
    fn test_message_url_keeps_query() {
        let id = MessageRef::new("1234");
        let t = transport("https://discord.com/api/webhooks/1/abc");
        assert_eq!(t.message_url(&id), "https://discord.com/api/webhooks/1/abc/messages/1234");

        let t = transport("https://discord.com/api/webhooks/1/abc?thread_id=9");
        assert_eq!(
            t.message_url(&id),
            "https://discord.com/api/webhooks/1/abc/messages/1234?thread_id=9"
        );
    }

    #[test]
    fn test_post_payload_shape() {
        let t = transport("https://discord.com/api/webhooks/1/abc");
        let message = StatusMessage::closed(&ServerDetails::new("127.0.0.1:25565"), Utc::now());
        let payload = PostPayload {
            username: &t.username,
            avatar_url: t.avatar_url.as_deref(),
            content: &message.content,
            embeds: [&message.embed],
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["username"], "lastcall");
        assert_eq!(json["avatar_url"], "https://example.com/avatar.png");
        assert_eq!(json["content"], "Server Closed.");
        assert_eq!(json["embeds"].as_array().unwrap().len(), 1);
        assert_eq!(json["embeds"][0]["color"], 0xff0000);
    }

    /// Answer one HTTP request with `status_line` and an empty JSON body
    async fn serve_once(status_line: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/webhooks/1/abc", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_lowercase();
                if let Some(end) = text.find("\r\n\r\n") {
                    let body_len = text
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|len| len.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if n == 0 || request.len() >= end + 4 + body_len {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{{}}",
                status_line
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        });
        url
    }

    #[tokio::test]
    async fn test_patch_of_deleted_message_is_gone() {
        let t = transport(&serve_once("404 Not Found").await);
        let id = MessageRef::new("1234");
        let message = StatusMessage::running(&ServerDetails::new("127.0.0.1:25565"), Utc::now(), Some(1));

        let err = t.patch(&id, &message).await.unwrap_err();

        assert!(matches!(err, NotifyError::Gone(gone) if gone == id));
    }

    #[tokio::test]
    async fn test_patch_server_error_keeps_status() {
        let t = transport(&serve_once("500 Internal Server Error").await);
        let message = StatusMessage::running(&ServerDetails::new("127.0.0.1:25565"), Utc::now(), Some(1));

        let err = t.patch(&MessageRef::new("1234"), &message).await.unwrap_err();

        assert!(matches!(err, NotifyError::Status { status: 500, .. }));
    }

    #[test]
    fn test_created_message_without_id() {
        let created: CreatedMessage = serde_json::from_str(r#"{"type":0}"#).unwrap();
        assert!(created.id.is_none());
    }
}
