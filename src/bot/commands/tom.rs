use std::time::Duration;

use tokio::time::timeout;

use crate::bot::commands::send_long_text;
use crate::bot::{Context, Error};
use crate::utils::api::{ChatMessage, LlmClient};
use crate::utils::event_pack::{Topic, keyword_topic, parse_topic};
use crate::utils::format::truncate_chars;

const LLM_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_EXCERPT_CHARS: usize = 1800;

fn classify_messages(event_name: &str, question: &str) -> Vec<ChatMessage> {
    let labels: Vec<String> = Topic::ALL
        .iter()
        .map(|t| format!("'{}'", t.label()))
        .collect();
    vec![
        ChatMessage::system(format!(
            "You are a classifier for {} Age of Sigmar event questions. Your job is to assign \
             one topic label to each question, based on the most relevant match. Choose only one \
             topic from this list: [{}]",
            event_name,
            labels.join(", ")
        )),
        ChatMessage::user(format!("Question: {}\nAnswer:", question)),
    ]
}

fn answer_messages(event_name: &str, topic: Topic, context: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!(
            "You are TomBot, the organiser's helper for {}. Answer only from the event pack \
             excerpt below. If the answer is not in it, say so and suggest asking the organiser. \
             Be brief and friendly.\n\nEVENT PACK ({}):\n{}",
            event_name,
            topic.label(),
            context
        )),
        ChatMessage::user(question.to_string()),
    ]
}

/// Classify with the LLM at temperature 0; keywords decide when it is unavailable or fails.
async fn classify(llm: &LlmClient, event_name: &str, question: &str) -> Topic {
    if !llm.is_available() {
        return keyword_topic(question);
    }
    let messages = classify_messages(event_name, question);
    match timeout(LLM_TIMEOUT, llm.chat(messages, 0.0, Some(10))).await {
        Ok(Ok(reply)) => parse_topic(&reply),
        Ok(Err(e)) => {
            log::warn!("Topic classification failed: {}", e);
            keyword_topic(question)
        }
        Err(_) => {
            log::warn!("Topic classification timed out");
            keyword_topic(question)
        }
    }
}

fn excerpt_reply(event_name: &str, topic: Topic, context: &str) -> String {
    format!(
        "**{}** ({}):\n{}",
        event_name,
        topic.label(),
        truncate_chars(context, MAX_EXCERPT_CHARS)
    )
}

/// Ask about the event: `!tom when does round one start?`
#[poise::command(prefix_command)]
pub async fn tom(ctx: Context<'_>, #[rest] question: Option<String>) -> Result<(), Error> {
    let question = question.unwrap_or_default();
    let question = question.trim();
    if question.is_empty() {
        ctx.say("Ask me about the event, e.g. `!tom when are lists due?`")
            .await?;
        return Ok(());
    }

    let data = ctx.data();
    let event = &data.event;
    if event.is_empty() {
        ctx.say("I don't have the event pack yet. Ask the organiser.")
            .await?;
        return Ok(());
    }

    ctx.defer().await?;
    let topic = classify(&data.llm, &event.event_name, question).await;
    let Some(context) = event.context_for(topic, question, data.config.tom.top_k) else {
        ctx.say(format!("I have nothing on {} for {}.", topic.label(), event.event_name))
            .await?;
        return Ok(());
    };
    log::info!("!tom '{}' -> {} ({} chars of context)", question, topic.label(), context.len());

    if !data.llm.is_available() {
        return send_long_text(&ctx, &excerpt_reply(&event.event_name, topic, &context)).await;
    }

    let messages = answer_messages(&event.event_name, topic, &context, question);
    match timeout(LLM_TIMEOUT, data.llm.chat(messages, 0.2, None)).await {
        Ok(Ok(answer)) => send_long_text(&ctx, &answer).await,
        Ok(Err(e)) => {
            log::error!("TomBot answer failed: {}", e);
            send_long_text(&ctx, &excerpt_reply(&event.event_name, topic, &context)).await
        }
        Err(_) => {
            log::warn!("TomBot answer timed out");
            send_long_text(&ctx, &excerpt_reply(&event.event_name, topic, &context)).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_messages_list_every_topic() {
        let messages = classify_messages("Roar in 24", "when do lists lock?");
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.starts_with("You are a classifier for Roar in 24"));
        assert!(messages[0].content.ends_with(
            "['scoring', 'venue', 'painting', 'schedule', 'lists', 'terrain', 'prizes', 'rules', 'faq']"
        ));
        assert_eq!(messages[1].content, "Question: when do lists lock?\nAnswer:");
    }

    #[test]
    fn test_answer_messages_carry_context() {
        let messages = answer_messages("Roar in 24", Topic::Venue, "Hall B.", "where?");
        assert!(messages[0].content.ends_with("EVENT PACK (venue):\nHall B."));
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "where?");
    }

    #[test]
    fn test_excerpt_reply_is_bounded() {
        let reply = excerpt_reply("Roar in 24", Topic::Faq, &"x".repeat(5000));
        assert!(reply.starts_with("**Roar in 24** (faq):\n"));
        assert!(reply.chars().count() < 1900);
    }
}
