use crate::{
    Email, MailerError,
    templates::{TemplateContext, TemplateData, TemplateEngine},
};

/// Notice sent to the site administrator when an address gets blocked.
pub struct BlockNotificationEmail;

impl BlockNotificationEmail {
    /// Wrap a plain-text notice in the block notification template.
    ///
    /// The subject is prefixed with the site name, e.g.
    /// `[Example] Address blocked after repeated failed logins`.
    pub async fn build<T: TemplateEngine>(
        engine: &T,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
        context: TemplateContext,
    ) -> Result<Email, MailerError> {
        let site_name = context.site_name.clone();
        let template_data = TemplateData::new()
            .insert("context", &context)?
            .insert("body", body)?;

        let html_body = engine
            .render_html("block_notification", template_data.clone())
            .await?;
        let text_body = engine
            .render_text("block_notification", template_data)
            .await?;

        Email::new(
            from,
            to,
            format!("[{site_name}] {subject}"),
            html_body,
            text_body,
        )
    }
}
