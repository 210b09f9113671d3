use crate::{MailerError, templates::TemplateData};
use askama::Template;
use async_trait::async_trait;

#[async_trait]
pub trait TemplateEngine: Send + Sync {
    async fn render_html(
        &self,
        template_name: &str,
        data: TemplateData,
    ) -> Result<String, MailerError>;

    async fn render_text(
        &self,
        template_name: &str,
        data: TemplateData,
    ) -> Result<String, MailerError>;
}

/// Renders the built-in templates compiled in with askama.
#[derive(Debug, Clone, Default)]
pub struct AskamaTemplateEngine;

impl AskamaTemplateEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TemplateEngine for AskamaTemplateEngine {
    async fn render_html(
        &self,
        template_name: &str,
        data: TemplateData,
    ) -> Result<String, MailerError> {
        match template_name {
            "block_notification" => {
                let template = crate::templates::BlockNotificationTemplate::from_data(data)?;
                Ok(template.render()?)
            }
            other => Err(MailerError::UnknownTemplate(other.to_string())),
        }
    }

    async fn render_text(
        &self,
        template_name: &str,
        data: TemplateData,
    ) -> Result<String, MailerError> {
        let html = self.render_html(template_name, data).await?;
        html_to_text(&html)
    }
}

/// Plain-text alternative derived from the rendered HTML.
fn html_to_text(html: &str) -> Result<String, MailerError> {
    let regex_err =
        |e: regex::Error| MailerError::InvalidEmail(format!("Failed to derive text body: {e}"));

    // Drop the head so the title and styles do not leak into the text
    let body = regex::Regex::new(r"(?s)<head>.*</head>")
        .map_err(regex_err)?
        .replace(html, "");

    // The templates already put one element per line
    let text = regex::Regex::new(r"<[^>]*>")
        .map_err(regex_err)?
        .replace_all(&body, "");

    let text = regex::Regex::new(r"[ \t]+")
        .map_err(regex_err)?
        .replace_all(&text, " ");

    let text = regex::Regex::new(r"\n[ \t]*")
        .map_err(regex_err)?
        .replace_all(&text, "\n");

    let text = regex::Regex::new(r"\n{3,}")
        .map_err(regex_err)?
        .replace_all(&text, "\n\n");

    Ok(unescape(text.trim()))
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&#x2f;", "/")
        .replace("&#x2F;", "/")
        .replace("&amp;", "&")
}
