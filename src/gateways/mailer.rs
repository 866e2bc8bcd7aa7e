use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use super::GatewayError;

const PROVIDER: &str = "SendGrid";
const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers the OTP email. No retry; the caller decides what a failure means.
    async fn send_otp_email(&self, to: &str, code: &str) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OtpEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn otp_email(code: &str) -> OtpEmail {
    OtpEmail {
        subject: "Your OTP Code".to_string(),
        text: format!("Your OTP code is: {}", code),
        html: format!("<p>Your OTP code is: <strong>{}</strong></p>", code),
    }
}

/// SendGrid v3 `mail/send` request body
#[derive(Serialize, Debug)]
struct SendGridRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Serialize, Debug)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize, Debug)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize, Debug)]
struct Content<'a> {
    #[serde(rename = "type")]
    mime: &'a str,
    value: &'a str,
}

#[derive(Debug, Clone)]
pub struct SendGridMailer {
    client: Client,
    api_key: String,
    sender: String,
}

impl SendGridMailer {
    pub fn new(client: Client, api_key: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    #[tracing::instrument(skip(self, code))]
    async fn send_otp_email(&self, to: &str, code: &str) -> Result<(), GatewayError> {
        let email = otp_email(code);
        let request_body = SendGridRequest {
            personalizations: vec![Personalization {
                to: vec![Address { email: to }],
            }],
            from: Address {
                email: &self.sender,
            },
            subject: &email.subject,
            content: vec![
                Content {
                    mime: "text/plain",
                    value: &email.text,
                },
                Content {
                    mime: "text/html",
                    value: &email.html,
                },
            ],
        };

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|source| {
                error!("Network error calling SendGrid: {}", source);
                GatewayError::Http {
                    provider: PROVIDER,
                    source,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!("SendGrid Error - Status: {}, Body: {}", status, body);
            return Err(GatewayError::Status {
                provider: PROVIDER,
                status,
                body,
            });
        }

        info!("OTP email accepted by SendGrid");
        Ok(())
    }
}
