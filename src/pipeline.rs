//! The per-file pipeline: read → decode → filter → build → deliver.
//!
//! Every failure is logged with its categorical tag and drops only the file
//! at hand. Nothing is remembered between files.

use std::path::Path;

use tracing::{debug, error, info, info_span, Instrument};

use crate::config::Config;
use crate::error::{LookoutError, Result};
use crate::filter::{is_relevant, MAIL_ID_HEADER, STAMPS_HEADER};
use crate::model::embed::WebhookPayload;
use crate::model::mail::DecodedMail;
use crate::notify::{EmbedBuilder, WebhookClient};
use crate::parser::mime;
use crate::parser::stamps::StampFilter;

/// What happened to one delivered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Posted; carries the id of the created message.
    Delivered(String),
    /// Not a mail we forward.
    Ignored,
    /// Failed somewhere; the failure has been logged.
    Dropped,
}

/// Everything a pipeline run needs. Immutable and shared by all tasks.
#[derive(Debug, Clone)]
pub struct Pipeline {
    filter: StampFilter,
    builder: EmbedBuilder,
    client: WebhookClient,
    username: Option<String>,
    avatar_url: Option<String>,
}

impl Pipeline {
    pub fn new(filter: StampFilter, builder: EmbedBuilder, client: WebhookClient) -> Self {
        Self {
            filter,
            builder,
            client,
            username: None,
            avatar_url: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = WebhookClient::new(config.webhook_url()?);
        let builder = EmbedBuilder::new(&config.tracker.base_url)?;
        let mut pipeline = Self::new(config.stamp_filter(), builder, client);
        pipeline.username = config.webhook.username.clone();
        pipeline.avatar_url = config.webhook.avatar_url.clone();
        Ok(pipeline)
    }

    pub fn filter(&self) -> &StampFilter {
        &self.filter
    }

    /// Handle a newly created file in the mail drop.
    pub async fn handle_create(&self, path: &Path) -> Outcome {
        let span = info_span!("mail_file", name = %path.display());
        self.process_file(path).instrument(span).await
    }

    async fn process_file(&self, path: &Path) -> Outcome {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) => {
                let err = LookoutError::io(path, e);
                error!(tag = err.tag(), error = %err, "failed to open file");
                return Outcome::Dropped;
            }
        };

        let mail = match mime::decode(&raw) {
            Ok(mail) => mail,
            Err(e) => {
                error!(tag = e.tag(), error = %e, "failed to decode mail");
                return Outcome::Dropped;
            }
        };

        self.process_mail(&mail).await
    }

    /// Filter, build and deliver an already decoded mail.
    pub async fn process_mail(&self, mail: &DecodedMail) -> Outcome {
        if !is_relevant(mail, &self.filter) {
            debug!(tag = "ignored_email", "not a matching maniphest email");
            return Outcome::Ignored;
        }

        let stamps = mail.header(STAMPS_HEADER).unwrap_or("");
        let mail_id = mail.header(MAIL_ID_HEADER).unwrap_or("");
        info!(
            tag = "maniphest_email",
            mail_id,
            subject = mail.header("Subject").unwrap_or(""),
            stamps,
            "got maniphest email"
        );

        // From here on the mail id identifies the item; it is shorter than the path.
        let span = info_span!("maniphest_email", mail_id);
        async {
            let payload = WebhookPayload {
                username: self.username.clone(),
                avatar_url: self.avatar_url.clone(),
                embeds: vec![self.builder.build(mail, stamps)],
            };
            match self.client.execute(&payload).await {
                Ok(id) => Outcome::Delivered(id),
                Err(e) => {
                    error!(tag = e.tag(), error = %e, "webhook delivery failed");
                    Outcome::Dropped
                }
            }
        }
        .instrument(span)
        .await
    }
}
