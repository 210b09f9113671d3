use crate::{MailerError, templates::TemplateData};
use askama::Template;
use serde::{Deserialize, Serialize};

/// Site details shared by every notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateContext {
    pub site_name: String,
    pub site_url: String,
    pub recipient: Option<String>,
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self {
            site_name: "My Site".to_string(),
            site_url: "https://example.com".to_string(),
            recipient: None,
        }
    }
}

#[derive(Template)]
#[template(
    source = r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Address blocked - {{ site_name }}</title>
    <style>
        body { font-family: Arial, sans-serif; line-height: 1.5; color: #222; margin: 0; padding: 20px; background-color: #f2f2f2; }
        .container { max-width: 600px; margin: 0 auto; background: white; padding: 28px; border-radius: 6px; border-top: 4px solid #c0392b; }
        .details { background: #fafafa; padding: 12px 16px; border-radius: 4px; font-family: monospace; }
        .details p { margin: 4px 0; }
        .footer { margin-top: 24px; padding-top: 16px; border-top: 1px solid #eee; font-size: 12px; color: #777; }
    </style>
</head>
<body>
    <div class="container">
        <h1>{{ site_name }}</h1>

        <h2>Address blocked</h2>

        <div class="details">
{% for line in lines %}            <p>{{ line }}</p>
{% endfor %}        </div>

        <div class="footer">
            <p>Sent by the login protection on <a href="{{ site_url }}">{{ site_name }}</a>.</p>
{% if let Some(recipient) = recipient %}            <p>{{ recipient }} is configured to receive these notifications.</p>
{% endif %}        </div>
    </div>
</body>
</html>
"#,
    ext = "html"
)]
pub struct BlockNotificationTemplate {
    pub site_name: String,
    pub site_url: String,
    pub recipient: Option<String>,
    pub lines: Vec<String>,
}

impl BlockNotificationTemplate {
    /// Expects `context` and `body`; blank body lines are dropped.
    pub fn from_data(data: TemplateData) -> Result<Self, MailerError> {
        let context: TemplateContext = data.require("context")?;
        let body: String = data.require("body")?;

        Ok(Self {
            site_name: context.site_name,
            site_url: context.site_url,
            recipient: context.recipient,
            lines: body
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}
