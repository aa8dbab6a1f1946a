use std::time::Duration;

use poise::serenity_prelude as serenity;
use tokio::time::timeout;

use crate::bot::{Context, Error};
use crate::utils::api::ChatMessage;
use crate::utils::format::truncate_chars;

const MAX_ATTACHMENT_BYTES: u32 = 200_000;
const MAX_TEXT_CHARS: usize = 4000;
const LLM_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are NoogBot. You repeat what someone else said, but in a dumber \
way, often missing the point. Keep it short, a bit confused, and kind of wrong. Do not explain \
what you are doing. Use plain ASCII only. Write as though you're typing casually from a mobile \
phone: keep sentences short, punctuation light, sometimes skip capitalization, use occasional \
typos/autocorrect quirks, but keep it natural and not unreadable. Avoid sounding like a PC \
keyboard essay; it should feel quick and mobile-typed.";

fn is_readable_attachment(size: u32, content_type: Option<&str>) -> bool {
    size <= MAX_ATTACHMENT_BYTES && content_type.is_some_and(|ct| ct.contains("text"))
}

fn user_prompt(text: &str) -> String {
    format!(
        "Rephrase this so it sounds dumber and slightly off the point. Keep it brief.\n\nTEXT:\n{}",
        text
    )
}

/// The replied-to message, or else the one just above the command.
async fn target_message(ctx: Context<'_>) -> Result<Option<serenity::Message>, Error> {
    let poise::Context::Prefix(pctx) = ctx else {
        return Ok(None);
    };
    let msg = pctx.msg;

    if let Some(referenced) = &msg.referenced_message {
        return Ok(Some((**referenced).clone()));
    }
    if let Some(id) = msg.message_reference.as_ref().and_then(|r| r.message_id) {
        match msg.channel_id.message(ctx.http(), id).await {
            Ok(found) => return Ok(Some(found)),
            Err(e) => log::warn!("Could not fetch referenced message {}: {}", id, e),
        }
    }

    let mut previous = msg
        .channel_id
        .messages(ctx.http(), serenity::GetMessages::new().before(msg.id).limit(1))
        .await?;
    Ok(previous.pop())
}

/// Message text, or the first small text attachment when the message has none.
async fn readable_text(message: &serenity::Message) -> Option<String> {
    let content = message.content.trim();
    if !content.is_empty() {
        return Some(truncate_chars(content, MAX_TEXT_CHARS));
    }
    for attachment in &message.attachments {
        if !is_readable_attachment(attachment.size, attachment.content_type.as_deref()) {
            continue;
        }
        match attachment.download().await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let text = text.trim();
                if !text.is_empty() {
                    return Some(truncate_chars(text, MAX_TEXT_CHARS));
                }
            }
            Err(e) => log::warn!("Failed to download {}: {}", attachment.filename, e),
        }
    }
    None
}

/// Repeat the message you replied to (or the previous one), but dumber
#[poise::command(prefix_command)]
pub async fn noog(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    if !data.llm.is_available() {
        ctx.say(":warning: noog needs an LLM API key.").await?;
        return Ok(());
    }

    let Some(target) = target_message(ctx).await? else {
        ctx.say(":warning: There is no message to noog.").await?;
        return Ok(());
    };
    let Some(text) = readable_text(&target).await else {
        ctx.say(":warning: That message had no readable text.").await?;
        return Ok(());
    };

    ctx.defer().await?;
    let messages = vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(user_prompt(&text)),
    ];
    match timeout(LLM_TIMEOUT, data.llm.chat(messages, 0.9, Some(200))).await {
        Ok(Ok(reply)) => {
            ctx.say(truncate_chars(&reply, 1900)).await?;
        }
        Ok(Err(e)) => {
            log::error!("noog failed: {}", e);
            ctx.say(format!(":x: LLM error: {}", e)).await?;
        }
        Err(_) => {
            ctx.say(":x: LLM took too long.").await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_readable_attachment() {
        assert!(is_readable_attachment(1024, Some("text/plain; charset=utf-8")));
        assert!(!is_readable_attachment(1024, Some("image/png")));
        assert!(!is_readable_attachment(1024, None));
        assert!(!is_readable_attachment(MAX_ATTACHMENT_BYTES + 1, Some("text/plain")));
    }

    #[test]
    fn test_user_prompt_embeds_text() {
        let prompt = user_prompt("skaven are balanced");
        assert!(prompt.ends_with("TEXT:\nskaven are balanced"));
    }
}
