/// Telegram Bot API client.
///
/// Two calls only: `sendMessage` for outbound notifications and
/// `getUpdates` for the `/start` / `/stop` command feed.
///
/// API Documentation: https://core.telegram.org/bots/api
///
/// `getUpdates` is driven by an offset of `cursor + 1`; Telegram then
/// drops everything at or below the cursor on its side. Updates without a
/// usable message/chat/text are skipped here so the ledger only ever sees
/// complete `InboundMessage`s — their update_ids are skipped too, which is
/// fine because the ledger tracks the maximum id over what it received and
/// stray service updates are rare and re-fetching them is harmless.

use serde::Deserialize;

use crate::bot::Messenger;
use crate::model::{BotError, InboundMessage};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    edited_message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Option<Chat>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// Blocking Telegram Bot API client for a single bot token.
pub struct TelegramClient {
    client: reqwest::blocking::Client,
    token: String,
}

impl TelegramClient {
    pub fn new(client: reqwest::blocking::Client, token: impl Into<String>) -> Self {
        TelegramClient { client, token: token.into() }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", TELEGRAM_API_URL, self.token, method)
    }
}

impl Messenger for TelegramClient {
    fn send(&self, chat_id: i64, text: &str) -> Result<(), BotError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .form(&[
                ("chat_id", chat_id.to_string()),
                ("text", text.to_string()),
                ("disable_web_page_preview", "true".to_string()),
            ])
            .send()
            .map_err(|e| BotError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::HttpError(response.status().as_u16()));
        }

        let body: SendResponse = response
            .json()
            .map_err(|e| BotError::ParseError(e.to_string()))?;
        if !body.ok {
            return Err(BotError::ApiRejected(
                body.description.unwrap_or_else(|| "no description".to_string()),
            ));
        }
        Ok(())
    }

    fn fetch_updates(&self, after: Option<i64>) -> Result<Vec<InboundMessage>, BotError> {
        let mut request = self.client.get(self.method_url("getUpdates"));
        if let Some(cursor) = after {
            request = request.query(&[("offset", (cursor + 1).to_string())]);
        }

        let response = request
            .send()
            .map_err(|e| BotError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BotError::HttpError(response.status().as_u16()));
        }

        let body: UpdatesResponse = response
            .json()
            .map_err(|e| BotError::ParseError(e.to_string()))?;
        if !body.ok {
            return Err(BotError::ApiRejected(
                body.description.unwrap_or_else(|| "no description".to_string()),
            ));
        }

        Ok(flatten_updates(body.result))
    }
}

/// Flattens raw updates to ledger input. Edited messages count the same as
/// new ones; anything without a chat id and text is dropped.
fn flatten_updates(updates: Vec<Update>) -> Vec<InboundMessage> {
    updates
        .into_iter()
        .filter_map(|u| {
            let msg = u.message.or(u.edited_message)?;
            let chat = msg.chat?;
            let text = msg.text?;
            Some(InboundMessage { update_id: u.update_id, chat_id: chat.id, text })
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_keeps_plain_messages() {
        let raw = r#"{"ok": true, "result": [
            {"update_id": 5, "message": {"chat": {"id": 333}, "text": "/start"}},
            {"update_id": 6, "message": {"chat": {"id": 111}, "text": "/stop"}}
        ]}"#;
        let body: UpdatesResponse = serde_json::from_str(raw).unwrap();
        let flat = flatten_updates(body.result);
        assert_eq!(
            flat,
            vec![
                InboundMessage { update_id: 5, chat_id: 333, text: "/start".into() },
                InboundMessage { update_id: 6, chat_id: 111, text: "/stop".into() },
            ]
        );
    }

    #[test]
    fn test_flatten_falls_back_to_edited_message() {
        let raw = r#"{"ok": true, "result": [
            {"update_id": 9, "edited_message": {"chat": {"id": 42}, "text": "/start"}}
        ]}"#;
        let body: UpdatesResponse = serde_json::from_str(raw).unwrap();
        let flat = flatten_updates(body.result);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].chat_id, 42);
    }

    #[test]
    fn test_flatten_drops_incomplete_updates() {
        // Service updates (member joins, polls, ...) carry no usable text.
        let raw = r#"{"ok": true, "result": [
            {"update_id": 1},
            {"update_id": 2, "message": {"chat": {"id": 7}}},
            {"update_id": 3, "message": {"text": "/start"}},
            {"update_id": 4, "message": {"chat": {"id": 8}, "text": "/start"}}
        ]}"#;
        let body: UpdatesResponse = serde_json::from_str(raw).unwrap();
        let flat = flatten_updates(body.result);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].update_id, 4);
    }

    #[test]
    fn test_rejected_response_surfaces_description() {
        let raw = r#"{"ok": false, "description": "Unauthorized"}"#;
        let body: UpdatesResponse = serde_json::from_str(raw).unwrap();
        assert!(!body.ok);
        assert_eq!(body.description.as_deref(), Some("Unauthorized"));
    }
}
