//! Built-in bot commands: instant responses, no provider call.


use crate::i18n;
use linerelay_memory::{HistoryStore, PromptStore, SessionState, SessionTracker};
use tracing::{error, info};

/// Grouped context for command execution.
pub struct CommandContext<'a> {
    pub history: &'a HistoryStore,
    pub prompts: &'a PromptStore,
    pub sessions: &'a SessionTracker,
    pub sender_id: &'a str,
    pub lang: &'a str,
}

/// Known bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Show the current prompt and wait for a replacement.
    SetPrompt,
    ClearPrompt,
    ResetHistory,
    Help,
}

impl Command {
    /// Parse a command from message text.
    ///
    /// Matches the whole trimmed message exactly. Anything else returns
    /// `None` and goes to the provider.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "設定提示詞" => Some(Self::SetPrompt),
            "清除提示詞" => Some(Self::ClearPrompt),
            "/bye" | "/clear" | "/reset" | "清除記憶" | "重新開始" => Some(Self::ResetHistory),
            "/help" | "幫助" | "說明" => Some(Self::Help),
            _ => None,
        }
    }
}

/// Handle a command and return the reply text.
pub async fn handle(cmd: Command, ctx: &CommandContext<'_>) -> String {
    match cmd {
        Command::SetPrompt => handle_set_prompt(ctx).await,
        Command::ClearPrompt => handle_clear_prompt(ctx).await,
        Command::ResetHistory => handle_reset(ctx).await,
        Command::Help => i18n::t("help", ctx.lang).to_string(),
    }
}

async fn handle_set_prompt(ctx: &CommandContext<'_>) -> String {
    let current = ctx.prompts.effective_prompt(ctx.sender_id).await;
    ctx.sessions.set(ctx.sender_id, SessionState::AwaitingPromptText);
    info!("{} is setting a new prompt", ctx.sender_id);
    i18n::format_prompt_show(ctx.lang, &current)
}

async fn handle_clear_prompt(ctx: &CommandContext<'_>) -> String {
    match ctx.prompts.clear_override(ctx.sender_id).await {
        Ok(true) => i18n::t("prompt_cleared", ctx.lang).to_string(),
        Ok(false) => i18n::t("prompt_not_set", ctx.lang).to_string(),
        Err(e) => {
            error!("failed to clear prompt for {}: {e}", ctx.sender_id);
            i18n::t("storage_failed", ctx.lang).to_string()
        }
    }
}

async fn handle_reset(ctx: &CommandContext<'_>) -> String {
    match ctx.history.clear(ctx.sender_id).await {
        Ok(_) => i18n::t("history_cleared", ctx.lang).to_string(),
        Err(e) => {
            error!("failed to clear history for {}: {e}", ctx.sender_id);
            i18n::t("storage_failed", ctx.lang).to_string()
        }
    }
}
