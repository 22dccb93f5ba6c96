use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    ChannelId, Colour, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, CreateMessage,
};
use serenity::http::Http;
use thiserror::Error;
use tracing::debug;

use crate::models::{ProfessorSummary, Review};

const EMBED_COLOUR: u32 = 0x3498DB;
const MAX_COMMENT_CHARS: usize = 1500;

/// A message could not be delivered to one channel. Logged and skipped;
/// never aborts the rest of the batch.
#[derive(Debug, Error)]
#[error("delivery to channel {channel_id} failed: {source}")]
pub struct DeliveryError {
    pub channel_id: u64,
    #[source]
    pub source: serenity::Error,
}

/// Delivers a formatted review announcement to a channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn announce(
        &self,
        channel_id: u64,
        review: &Review,
        professor: Option<&ProfessorSummary>,
    ) -> Result<(), DeliveryError>;
}

/// Production notifier backed by the Discord REST API.
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn announce(
        &self,
        channel_id: u64,
        review: &Review,
        professor: Option<&ProfessorSummary>,
    ) -> Result<(), DeliveryError> {
        let embed = build_review_embed(review, professor);
        let message = CreateMessage::new().embed(embed);

        ChannelId::new(channel_id)
            .send_message(&*self.http, message)
            .await
            .map_err(|source| DeliveryError { channel_id, source })?;

        debug!(channel = channel_id, review = %review.id, "Announced review");

        Ok(())
    }
}

pub fn build_review_embed(review: &Review, professor: Option<&ProfessorSummary>) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(embed_title(review))
        .description(embed_description(review))
        .colour(Colour::new(EMBED_COLOUR))
        .footer(CreateEmbedFooter::new(embed_footer(review)));

    if let Some(professor) = professor {
        embed = embed.author(CreateEmbedAuthor::new(format!(
            "{} · {}",
            professor.full_name(),
            professor.department
        )));
    }

    for (name, value, inline) in embed_fields(review) {
        embed = embed.field(name, value, inline);
    }

    embed
}

pub fn embed_title(review: &Review) -> String {
    if review.class_name.trim().is_empty() {
        "New review".to_string()
    } else {
        format!("New review · {}", review.class_name.trim())
    }
}

pub fn embed_description(review: &Review) -> String {
    let comment = review.comment.trim();
    if comment.is_empty() {
        return "*No comment left.*".to_string();
    }

    if comment.chars().count() > MAX_COMMENT_CHARS {
        let truncated: String = comment.chars().take(MAX_COMMENT_CHARS).collect();
        format!("{truncated}…")
    } else {
        comment.to_string()
    }
}

pub fn embed_fields(review: &Review) -> Vec<(String, String, bool)> {
    let mut fields = vec![
        (
            "Quality".to_string(),
            format!("{:.1}/5", review.helpful_rating),
            true,
        ),
        (
            "Difficulty".to_string(),
            format!("{:.1}/5", review.difficulty_rating),
            true,
        ),
    ];

    if let Some(grade) = review.grade.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
        fields.push(("Grade".to_string(), grade.to_string(), true));
    }

    if let Some(wta) = review.would_take_again {
        let answer = if wta > 0.0 { "Yes" } else { "No" };
        fields.push(("Would take again".to_string(), answer.to_string(), true));
    }

    if let Some(attendance) = attendance_display(review.attendance_mandatory.as_deref()) {
        fields.push(("Attendance".to_string(), attendance, true));
    }

    if let Some(use_level) = review.textbook_use {
        fields.push(("Textbook use".to_string(), format!("{use_level}/5"), true));
    }

    if review.is_for_online_class {
        fields.push(("Format".to_string(), "Online class".to_string(), true));
    }

    let tags = review.tags();
    if !tags.is_empty() {
        fields.push(("Tags".to_string(), tags.join(", "), false));
    }

    fields
}

pub fn embed_footer(review: &Review) -> String {
    format!(
        "{} · 👍 {} · 👎 {}",
        review.date_display(),
        review.thumbs_up_total,
        review.thumbs_down_total
    )
}

fn attendance_display(raw: Option<&str>) -> Option<String> {
    match raw.map(str::trim) {
        Some("mandatory") => Some("Mandatory".to_string()),
        Some("non_mandatory") => Some("Not mandatory".to_string()),
        Some("") | None => None,
        Some(other) => Some(other.to_string()),
    }
}
