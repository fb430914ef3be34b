//! Customer notifications for order status changes
//!
//! [`format_notification`] is a pure function from an order and a status to a
//! ready-to-send message. Delivery goes through a [`NotificationDispatcher`];
//! the transport behind it is not this crate's concern.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::models::order::{OrderStatus, OrderView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Html,
    Plain,
}

/// Structured message handed to the dispatch channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Customer chat/user id
    pub recipient: String,
    pub text: String,
    pub render_mode: RenderMode,
}

struct StatusTemplate {
    title: &'static str,
    body: &'static str,
    eta: Option<&'static str>,
}

fn template(status: OrderStatus) -> StatusTemplate {
    match status {
        OrderStatus::Placed => StatusTemplate {
            title: "🛒 Order placed",
            body: "We have your order and will confirm it shortly.",
            eta: Some("Confirmation within 15 minutes"),
        },
        OrderStatus::Received => StatusTemplate {
            title: "✅ Order confirmed",
            body: "Your order has been accepted and is queued for preparation.",
            eta: Some("Preparation starts within 30 minutes"),
        },
        OrderStatus::InProgress => StatusTemplate {
            title: "👨‍🍳 Order in progress",
            body: "Your order is being prepared right now.",
            eta: Some("Ready in 20-40 minutes"),
        },
        OrderStatus::OutForDelivery => StatusTemplate {
            title: "🚚 Out for delivery",
            body: "A courier is on the way to your address.",
            eta: Some("Arrives in 15-45 minutes"),
        },
        OrderStatus::Delivered => StatusTemplate {
            title: "📦 Delivered",
            body: "Your order has been delivered. Thank you for ordering with us!",
            eta: None,
        },
        OrderStatus::Cancelled => StatusTemplate {
            title: "❌ Order cancelled",
            body: "Your order has been cancelled. Contact us if this is unexpected.",
            eta: None,
        },
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the customer message for `status`. Deterministic, no I/O.
pub fn format_notification(order: &OrderView, status: OrderStatus, custom_message: Option<&str>) -> OutboundMessage {
    let tpl = template(status);
    let short_id: String = order.id.chars().take(8).collect();

    let mut text = format!("<b>{}</b>\n\n{}\n\n<b>Order:</b> #{}", tpl.title, tpl.body, short_id);
    if let Some(eta) = tpl.eta {
        text.push_str(&format!("\n<b>Estimated time:</b> {}", eta));
    }

    if !order.items.is_empty() {
        text.push_str("\n\n<b>Items:</b>");
        for item in &order.items {
            text.push_str(&format!(
                "\n• {} × {} - ${:.2}",
                escape_html(&item.product_name),
                item.quantity,
                item.total_price
            ));
        }
    }
    text.push_str(&format!("\n\n<b>Total:</b> ${:.2}", order.total_amount));

    if let Some(custom) = custom_message.map(str::trim).filter(|m| !m.is_empty()) {
        text.push_str(&format!("\n\n{}", escape_html(custom)));
    }

    OutboundMessage {
        recipient: order.customer_id.clone(),
        text,
        render_mode: RenderMode::Html,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Notification transport error: {0}")]
    Transport(String),
    #[error("Notification endpoint rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers formatted messages to customers
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, message: &OutboundMessage) -> Result<(), DispatchError>;
}

/// Posts messages as JSON to a webhook
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(url: String, timeout_secs: u64) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn dispatch(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(recipient = %message.recipient, "Notification delivered to webhook");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Logs messages instead of sending them; used when no webhook is configured
#[derive(Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        info!(recipient = %message.recipient, text = %message.text, "Notification (log only)");
        Ok(())
    }
}

/// Keeps messages in memory; can be switched to fail every dispatch
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: Mutex<bool>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let dispatcher = Self::default();
        dispatcher.set_failing(true);
        dispatcher
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        if *self.failing.lock() {
            return Err(DispatchError::Transport("dispatcher set to fail".to_string()));
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
