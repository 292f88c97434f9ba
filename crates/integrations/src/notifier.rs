//! Email (SendGrid) and Discord delivery.

use std::time::Duration;

use async_trait::async_trait;
use engine::{Budget, Money, Notifier, NotifyError, Transaction, UserContact};
use reqwest::Url;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{IntegrationError, Result};

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const SENDER_NAME: &str = "Smart Budget";

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|err| IntegrationError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    })
}

/// Rough text alternative of an HTML body.
fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sends email through SendGrid and mirrors alerts to a Discord webhook.
///
/// Without a SendGrid key emails are only logged. Discord is optional.
#[derive(Clone, Debug)]
pub struct HttpNotifier {
    http: reqwest::Client,
    sendgrid_url: Url,
    sendgrid_api_key: Option<String>,
    from_email: String,
    discord_webhook_url: Option<Url>,
}

impl HttpNotifier {
    pub fn new(
        sendgrid_api_key: Option<String>,
        from_email: impl Into<String>,
        discord_webhook_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let discord_webhook_url = discord_webhook_url.map(parse_url).transpose()?;
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            sendgrid_url: parse_url(SENDGRID_URL)?,
            sendgrid_api_key: sendgrid_api_key.filter(|key| !key.trim().is_empty()),
            from_email: from_email.into(),
            discord_webhook_url,
        })
    }

    /// Points email delivery at another SendGrid-compatible endpoint.
    pub fn with_sendgrid_url(mut self, url: &str) -> Result<Self> {
        self.sendgrid_url = parse_url(url)?;
        Ok(self)
    }

    async fn post(&self, url: Url, body: &Value, key: Option<&str>) -> std::result::Result<(), NotifyError> {
        let mut request = self.http.post(url).json(body);
        if let Some(key) = key {
            request = request.bearer_auth(key);
        }
        let res = request
            .send()
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = res.text().await.unwrap_or_default();
        Err(NotifyError::Transport(format!("{status}: {detail}")))
    }

    async fn discord(&self, content: String, embed: Value) -> std::result::Result<(), NotifyError> {
        let Some(url) = self.discord_webhook_url.clone() else {
            return Ok(());
        };
        let body = json!({ "content": content, "embeds": [embed] });
        self.post(url, &body, None).await
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> std::result::Result<(), NotifyError> {
        let Some(key) = self.sendgrid_api_key.as_deref() else {
            debug!(to, subject, "no sendgrid key, email skipped");
            return Ok(());
        };
        let body = json!({
            "personalizations": [{ "to": [{ "email": to }], "subject": subject }],
            "from": { "email": self.from_email, "name": SENDER_NAME },
            "content": [
                { "type": "text/plain", "value": strip_html(html) },
                { "type": "text/html", "value": html },
            ],
        });
        self.post(self.sendgrid_url.clone(), &body, Some(key)).await?;
        info!(to, subject, "email sent");
        Ok(())
    }

    async fn send_transaction_alert(
        &self,
        user: &UserContact,
        transaction: &Transaction,
    ) -> std::result::Result<(), NotifyError> {
        let amount = Money::new(transaction.amount_minor);
        let kind = transaction.kind.as_str();
        let status = transaction.status.as_str();
        let html = format!(
            "<h2>Transaction update</h2>\
             <p>Hello {name},</p>\
             <p>Your {kind} of {amount} is now <strong>{status}</strong>.</p>\
             <p>Reference: {reference}</p>",
            name = user.name,
            reference = transaction.reference,
        );
        self.send_email(&user.email, &format!("Smart Budget: {kind} {status}"), &html)
            .await?;

        let color = if transaction.kind.is_credit() { 0x00ff00 } else { 0xff0000 };
        self.discord(
            format!("New transaction - {}", user.name),
            json!({
                "color": color,
                "title": format!("{kind} {status}"),
                "fields": [
                    { "name": "User", "value": user.user_id, "inline": true },
                    { "name": "Amount", "value": amount.to_string(), "inline": true },
                    { "name": "Reference", "value": transaction.reference, "inline": true },
                ],
            }),
        )
        .await
    }

    async fn send_budget_threshold_alert(
        &self,
        user: &UserContact,
        budget: &Budget,
        percent_used: u32,
    ) -> std::result::Result<(), NotifyError> {
        let html = format!(
            "<h2>Budget alert</h2>\
             <p>Hello {name},</p>\
             <p>You have used {percent_used}% of your {category} budget ({amount}).</p>",
            name = user.name,
            category = budget.category_id,
            amount = Money::new(budget.amount_minor),
        );
        self.send_email(&user.email, "Smart Budget: Budget usage alert", &html)
            .await?;
        self.discord(
            format!("Budget alert - {}", user.name),
            json!({
                "color": 0xffa500,
                "title": format!("{percent_used}% of {} used", budget.category_id),
            }),
        )
        .await
    }
}
