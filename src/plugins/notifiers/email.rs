use crate::config::SmtpConfig;
use crate::models::{ChangeEvent, ChangeKind};
use crate::plugins::traits::NotificationSink;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub struct EmailSink {
    config: SmtpConfig,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl EmailSink {
    pub fn new(config: SmtpConfig) -> Self {
        EmailSink { config }
    }

    fn format_subject(&self, event: &ChangeEvent) -> String {
        let title = event.item.display_title();
        match event.kind {
            ChangeKind::PriceDroppedBelowThreshold => format!(
                "Price Alert: {} - €{:.2}",
                title,
                event.new_price.unwrap_or(event.item.current_price)
            ),
            ChangeKind::BackInStock => format!("Back in Stock: {}", title),
            ChangeKind::PriceChanged => format!("Price Update: {}", title),
            ChangeKind::OutOfStock => format!("Out of Stock: {}", title),
        }
    }

    fn format_text_body(&self, event: &ChangeEvent) -> String {
        let item = &event.item;
        let mut text = String::new();

        text.push_str("Blu-ray Tracker Notification\n");
        text.push_str("============================\n\n");
        text.push_str(&event.describe());
        text.push_str("\n\n");

        text.push_str("Product Details:\n");
        text.push_str(&format!("Title: {}\n", item.display_title()));
        text.push_str(&format!("URL: {}\n", item.url));
        text.push_str(&format!("Source: {}\n", item.source));

        if let Some(new_price) = event.new_price {
            text.push_str(&format!("Current Price: €{:.2}\n", new_price));

            if let Some(old_price) = event.old_price {
                if (old_price - new_price).abs() > f64::EPSILON {
                    text.push_str(&format!("Previous Price: €{:.2}\n", old_price));
                }
            }
        }

        if item.desired_max_price > 0.0 {
            text.push_str(&format!("Your Max Price: €{:.2}\n", item.desired_max_price));
        }

        if item.is_uhd_4k {
            text.push_str("Format: UHD 4K\n");
        }

        let stock = if item.in_stock { "In Stock" } else { "Out of Stock" };
        text.push_str(&format!("Stock Status: {}\n", stock));

        text.push_str("\n--\nBlu-ray Tracker\n");
        text
    }

    fn build_message(&self, event: &ChangeEvent) -> Result<Message> {
        let from_address = non_empty(&self.config.from_address)
            .ok_or_else(|| AppError::Email("from_address not configured".to_string()))?;
        let to_address = non_empty(&self.config.to_address)
            .ok_or_else(|| AppError::Email("to_address not configured".to_string()))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = to_address.parse()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(self.format_subject(event))
            .header(ContentType::TEXT_PLAIN)
            .body(self.format_text_body(event))?;

        Ok(message)
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self.config.host.trim();

        let mut builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        }
        .port(self.config.port);

        if let (Some(username), Some(password)) = (
            non_empty(&self.config.username),
            self.config.password.as_deref(),
        ) {
            builder = builder.credentials(Credentials::new(username.to_string(), password.to_string()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn name(&self) -> &'static str {
        "email"
    }

    fn is_configured(&self) -> bool {
        !self.config.host.trim().is_empty()
            && non_empty(&self.config.username).is_some()
            && non_empty(&self.config.from_address).is_some()
            && non_empty(&self.config.to_address).is_some()
    }

    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        if !self.is_configured() {
            return Err(AppError::Notification {
                sink: self.name().to_string(),
                message: "smtp settings incomplete".to_string(),
            });
        }

        let email = self.build_message(event)?;
        let mailer = self.build_transport()?;
        mailer.send(email).await?;

        tracing::info!("Email notification sent: {}", event.describe());
        Ok(())
    }
}
