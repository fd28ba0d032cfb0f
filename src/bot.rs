use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{Me, ReactionType};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::llm::LlmClient;
use crate::pdf;

// Fixed user-facing replies; handlers never leak raw errors to the chat.
const REPLY_NO_ATTACHMENT: &str = "⚠️ No file attached!";
const REPLY_NOT_A_PDF: &str = "⚠️ Please upload a `.pdf` file.";
const REPLY_NO_TEXT: &str = "⚠️ No readable text found in the PDF!";
const REPLY_GENERIC_ERROR: &str = "Error: An issue occurred while processing your question.";

const ACK_REACTION: &str = "👍";

const HELP_TEXT: &str = "Commands:\n\
     !ping - Responds with 'Pong!'\n\
     !ask <question> - Sends the question to the model and replies with the answer\n\
     !sumcontent - Summarizes the content of the attached PDF file\n\
     !askaboutcontent <question> - Answers a question about the attached PDF file";

const SUMMARIZE_INSTRUCTION: &str = "Summarize the following text concisely:";

/// Shared application state
pub struct AppState {
    llm: LlmClient,
    config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let llm = LlmClient::new(config.llm.clone());
        Self { llm, config }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Ping,
    Ask(&'a str),
    SumContent,
    AskAboutContent(&'a str),
    Help,
}

/// Parse a command out of a message. Both `!` and Telegram's native `/`
/// prefix are accepted; anything unrecognized yields `None`.
fn parse_command(text: &str) -> Option<Command<'_>> {
    let rest = text
        .strip_prefix('!')
        .or_else(|| text.strip_prefix('/'))?;

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    // Group chats address commands as /cmd@BotName.
    let name = match name.split_once('@') {
        Some((name, _)) => name,
        None => name,
    };

    match name {
        "ping" => Some(Command::Ping),
        "ask" => Some(Command::Ask(arg)),
        "sumcontent" => Some(Command::SumContent),
        "askaboutcontent" => Some(Command::AskAboutContent(arg)),
        "help" | "start" => Some(Command::Help),
        _ => None,
    }
}

/// Start the Telegram bot
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.config.telegram.bot_token);

    let me = bot.get_me().await?;
    info!("Logged in as @{}", me.username());

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state, me])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, me: Me, state: Arc<AppState>) -> ResponseResult<()> {
    // The bot's own messages are never commands.
    if msg.from.as_ref().is_some_and(|user| user.id == me.user.id) {
        return Ok(());
    }

    // PDF commands usually arrive as the caption of a document message.
    let text = match msg.text().or_else(|| msg.caption()) {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    let command = match parse_command(&text) {
        Some(c) => c,
        None => return Ok(()),
    };

    info!("Command in chat {}: {}", msg.chat.id, text);

    // Let the user know the command was seen before any slow work starts.
    bot.set_message_reaction(msg.chat.id, msg.id)
        .reaction(vec![ReactionType::Emoji {
            emoji: ACK_REACTION.to_string(),
        }])
        .await
        .ok();

    let reply = reply_or_generic(run_command(&bot, &msg, &state, command).await);

    // Split long replies (Telegram has a 4096 char limit)
    for chunk in split_message(&reply, 4000) {
        bot.send_message(msg.chat.id, chunk).await?;
    }

    Ok(())
}

/// Handler results are mapped to chat text here; raw errors are logged and
/// the user only ever sees the fixed generic message.
fn reply_or_generic(result: Result<String>) -> String {
    match result {
        Ok(reply) => reply,
        Err(e) => {
            error!("Error handling command: {:#}", e);
            REPLY_GENERIC_ERROR.to_string()
        }
    }
}

async fn run_command(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    command: Command<'_>,
) -> Result<String> {
    match command {
        Command::Ping => Ok("Pong!".to_string()),
        Command::Help => Ok(HELP_TEXT.to_string()),
        Command::Ask("") => Ok("Usage: !ask <question>".to_string()),
        Command::Ask(question) => {
            state
                .llm
                .complete(question, None, state.llm.default_model())
                .await
        }
        Command::SumContent => {
            answer_about_document(bot, msg, state, SUMMARIZE_INSTRUCTION, "PDF Summary").await
        }
        Command::AskAboutContent("") => Ok("Usage: !askaboutcontent <question>".to_string()),
        Command::AskAboutContent(question) => {
            answer_about_document(bot, msg, state, question, "Response").await
        }
    }
}

/// Shared flow for the two PDF commands: validate the attachment, extract
/// its text, pick a model by document size, then run one completion.
async fn answer_about_document(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    instruction: &str,
    heading: &str,
) -> Result<String> {
    let doc = match msg.document() {
        Some(doc) => doc,
        None => return Ok(REPLY_NO_ATTACHMENT.to_string()),
    };

    let file_name = doc.file_name.as_deref().unwrap_or("");
    if !pdf::is_pdf_filename(file_name) {
        return Ok(REPLY_NOT_A_PDF.to_string());
    }

    let text = pdf::extract_document_text(bot, doc).await?;
    if text.trim().is_empty() {
        return Ok(REPLY_NO_TEXT.to_string());
    }

    let model = state.llm.select_model(&text).to_string();
    let answer = state.llm.complete(instruction, Some(&text), &model).await?;

    Ok(format!("📄 **{} using {}:**\n```{}```", heading, model, answer))
}

fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Never cut a multibyte character in half.
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // max_len is smaller than a single character; take it whole.
            end = (start + max_len).min(text.len());
            while end < text.len() && !text.is_char_boundary(end) {
                end += 1;
            }
        }

        // Try to split at a newline or space
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ping() {
        assert_eq!(parse_command("!ping"), Some(Command::Ping));
        assert_eq!(parse_command("/ping"), Some(Command::Ping));
    }

    #[test]
    fn test_parse_ask_with_argument() {
        assert_eq!(
            parse_command("!ask what is borrowing?"),
            Some(Command::Ask("what is borrowing?"))
        );
    }

    #[test]
    fn test_parse_ask_trims_argument() {
        assert_eq!(parse_command("!ask   spaced   "), Some(Command::Ask("spaced")));
        assert_eq!(parse_command("!ask"), Some(Command::Ask("")));
    }

    #[test]
    fn test_parse_pdf_commands() {
        assert_eq!(parse_command("!sumcontent"), Some(Command::SumContent));
        assert_eq!(
            parse_command("/askaboutcontent who wrote this?"),
            Some(Command::AskAboutContent("who wrote this?"))
        );
    }

    #[test]
    fn test_parse_help_aliases() {
        assert_eq!(parse_command("/start"), Some(Command::Help));
        assert_eq!(parse_command("!help"), Some(Command::Help));
    }

    #[test]
    fn test_unrecognized_input_is_ignored() {
        assert_eq!(parse_command("hello there"), None);
        assert_eq!(parse_command("!frobnicate"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("ping"), None);
    }

    #[test]
    fn test_split_message_short() {
        let chunks = split_message("hello", 4000);
        assert_eq!(chunks, vec!["hello".to_string()]);
    }

    #[test]
    fn test_split_message_prefers_newline() {
        let text = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_message(&text, 40);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].ends_with('\n'));
        assert_eq!(chunks[1], "b".repeat(30));
    }

    #[test]
    fn test_split_message_covers_all_text() {
        let text = "word ".repeat(2000);
        let chunks = split_message(&text, 4000);
        assert!(chunks.iter().all(|c| c.len() <= 4000));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_message_multibyte_at_boundary() {
        // Byte 4000 lands inside an 'é'; chunking must back off to the
        // previous character boundary instead of panicking.
        let text = format!("{}{}", "a".repeat(3999), "é".repeat(100));
        let chunks = split_message(&text, 4000);
        assert!(chunks.iter().all(|c| c.len() <= 4000));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_message_emoji_only() {
        let text = "🦀".repeat(100);
        let chunks = split_message(&text, 10);
        assert!(chunks.iter().all(|c| c.len() <= 10));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_parse_command_with_bot_mention() {
        assert_eq!(parse_command("/ping@PaperBot"), Some(Command::Ping));
        assert_eq!(
            parse_command("/askaboutcontent@PaperBot who wrote this?"),
            Some(Command::AskAboutContent("who wrote this?"))
        );
        assert_eq!(parse_command("/frobnicate@PaperBot"), None);
    }

    #[test]
    fn test_reply_or_generic_passes_ok_through() {
        assert_eq!(reply_or_generic(Ok("Pong!".to_string())), "Pong!");
    }

    #[test]
    fn test_reply_or_generic_hides_errors() {
        let result = Err(anyhow::anyhow!("completion API error (500): boom"));
        assert_eq!(reply_or_generic(result), REPLY_GENERIC_ERROR);
    }
}
