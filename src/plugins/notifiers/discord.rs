use crate::config::DiscordConfig;
use crate::models::{ChangeEvent, ChangeKind};
use crate::plugins::traits::NotificationSink;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

pub struct DiscordSink {
    client: Client,
    config: DiscordConfig,
}

impl DiscordSink {
    pub fn new(config: DiscordConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(DiscordSink { client, config })
    }

    fn webhook_url(&self) -> Option<&str> {
        self.config
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    fn get_embed_color(&self, kind: ChangeKind) -> u32 {
        match kind {
            ChangeKind::PriceDroppedBelowThreshold => 0x00ff00, // Green
            ChangeKind::BackInStock => 0x0099ff,                // Blue
            ChangeKind::OutOfStock => 0xff0000,                 // Red
            ChangeKind::PriceChanged => 0xffaa00,               // Orange
        }
    }

    fn build_message(&self, event: &ChangeEvent) -> String {
        let title = event.item.display_title();
        match event.kind {
            ChangeKind::PriceDroppedBelowThreshold => format!("🎉 **Price Alert!** - {}", title),
            ChangeKind::BackInStock => format!("📦 **Back in Stock!** - {}", title),
            ChangeKind::PriceChanged => format!("💰 Price Update - {}", title),
            ChangeKind::OutOfStock => format!("⚠️ Out of Stock - {}", title),
        }
    }

    fn create_embed(&self, event: &ChangeEvent) -> serde_json::Value {
        let mut fields = Vec::new();

        if let Some(price) = event.new_price {
            fields.push(json!({
                "name": "Current Price",
                "value": format!("€{:.2}", price),
                "inline": true
            }));
        }

        if event.item.desired_max_price > 0.0 {
            fields.push(json!({
                "name": "Your Max Price",
                "value": format!("€{:.2}", event.item.desired_max_price),
                "inline": true
            }));
        }

        if event.item.is_uhd_4k {
            fields.push(json!({
                "name": "Format",
                "value": "🎬 UHD 4K",
                "inline": true
            }));
        }

        if !event.item.source.is_empty() {
            fields.push(json!({
                "name": "Source",
                "value": event.item.source,
                "inline": true
            }));
        }

        let mut embed = json!({
            "title": event.item.display_title(),
            "url": event.item.url,
            "description": event.describe(),
            "color": self.get_embed_color(event.kind),
            "timestamp": event.detected_at.to_rfc3339(),
            "fields": fields,
        });

        if let Some(image_url) = &event.item.image_url {
            embed["thumbnail"] = json!({ "url": image_url });
        }

        embed
    }

    fn create_webhook_payload(&self, event: &ChangeEvent) -> serde_json::Value {
        let mut payload = json!({
            "content": self.build_message(event),
            "embeds": [self.create_embed(event)],
            "username": self.config.username,
        });

        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        payload
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn is_configured(&self) -> bool {
        self.webhook_url().is_some()
    }

    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        let webhook_url = self.webhook_url().ok_or_else(|| AppError::Notification {
            sink: self.name().to_string(),
            message: "webhook url not configured".to_string(),
        })?;

        let payload = self.create_webhook_payload(event);
        let response = self.client.post(webhook_url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Notification {
                sink: self.name().to_string(),
                message: format!("webhook returned status {}", status),
            });
        }

        tracing::info!("Discord notification sent: {}", event.describe());
        Ok(())
    }
}
