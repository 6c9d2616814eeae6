use std::{ops::Deref, sync::Arc};

use aws_sdk_sesv2::{
    types::{Body, Content, Destination, EmailContent, Message},
    Client as SesClient,
};
use log::info;
use serde::Deserialize;

use crate::error::{Error, Result};

const INVITE_SUBJECT: &str = "Convite para entrar na Equipe - App O Assessor";

/// Body of `POST /invites`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InviteRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nome: Option<String>,
}

impl InviteRequest {
    /// Recipient address and name, both required.
    pub fn into_parts(self) -> Result<(String, String)> {
        let email = self.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        let name = self.nome.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        match (email, name) {
            (Some(email), Some(name)) => Ok((email, name)),
            _ => Err(Error::bad_request("Missing email or nome")),
        }
    }
}

/// A rendered invitation email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl InviteEmail {
    /// The invitation for `name` at `email`, linking to the sign-up page.
    pub fn render(email: &str, name: &str, invite_url: &str) -> Self {
        let link = format!("{invite_url}?email={}", encode_query_value(email));
        let name = escape_html(name);
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; border: 1px solid #e2e8f0; border-radius: 8px; overflow: hidden;">
  <div style="background-color: #16a34a; padding: 24px; text-align: center;">
    <h1 style="color: #ffffff; margin: 0; font-size: 24px;">Bem-vindo ao O Assessor!</h1>
  </div>
  <div style="padding: 24px; color: #334155;">
    <p>Olá <strong>{name}</strong>,</p>
    <p>Você foi convidado para fazer parte da equipe no aplicativo O Assessor.</p>
    <p>Para concluir seu cadastro, clique no botão abaixo:</p>
    <div style="text-align: center; margin: 32px 0;">
      <a href="{link}" style="background-color: #16a34a; color: #ffffff; padding: 12px 24px; border-radius: 6px; text-decoration: none; font-weight: bold;">Aceitar Convite</a>
    </div>
    <p style="font-size: 12px; color: #94a3b8;">Se o botão não funcionar, copie e cole este link no navegador:<br>{link}</p>
    <p>Atenciosamente,<br>Equipe O Assessor</p>
  </div>
</div>"#
        );
        Self {
            to: email.to_string(),
            subject: INVITE_SUBJECT.to_string(),
            html,
        }
    }
}

/// Percent-encode a query parameter value.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'@' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Sends staff invitations.
#[rocket::async_trait]
pub trait InviteMailer: Send + Sync {
    async fn send_invite(&self, email: &str, name: &str) -> Result<()>;
}

/// Handle on the configured mailer, kept in managed state.
#[derive(Clone)]
pub struct Mailer(pub Arc<dyn InviteMailer>);

impl Deref for Mailer {
    type Target = dyn InviteMailer;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

/// Invitations delivered through Amazon SES.
pub struct SesMailer {
    client: SesClient,
    sender: String,
    invite_url: String,
}

impl SesMailer {
    pub fn new(client: SesClient, sender: &str, invite_url: &str) -> Self {
        Self {
            client,
            sender: sender.to_string(),
            invite_url: invite_url.to_string(),
        }
    }
}

fn utf8(data: &str) -> Result<Content> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| Error::Mail(e.to_string()))
}

#[rocket::async_trait]
impl InviteMailer for SesMailer {
    async fn send_invite(&self, email: &str, name: &str) -> Result<()> {
        let invite = InviteEmail::render(email, name, &self.invite_url);
        let message = Message::builder()
            .subject(utf8(&invite.subject)?)
            .body(Body::builder().html(utf8(&invite.html)?).build())
            .build();
        let output = self
            .client
            .send_email()
            .from_email_address(&self.sender)
            .destination(Destination::builder().to_addresses(&invite.to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| Error::Mail(e.to_string()))?;
        info!(
            "Sent invite to {} ({})",
            invite.to,
            output.message_id().unwrap_or("no message id")
        );
        Ok(())
    }
}
