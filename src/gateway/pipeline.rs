//! Message processing pipeline: the handle_message flow.

use super::Gateway;
use crate::commands::{self, Command, CommandContext};
use crate::i18n;
use linerelay_core::{
    context::{Context, ContextEntry, ImageData},
    message::{Attachment, IncomingMessage},
};
use linerelay_memory::{SessionState, Turn};
use tracing::{error, info, warn};

impl Gateway {
    /// Process a single incoming message. Sends exactly one reply.
    pub(super) async fn handle_message(&self, incoming: IncomingMessage) {
        // --- 0. IMAGES ---
        // Bypass the prompt flow and commands; a pending prompt stays pending.
        if let Some(image) = incoming.image() {
            info!(
                "[{}] {} sent image {}",
                incoming.channel, incoming.sender_id, image.content_id
            );
            self.describe_image(&incoming, image).await;
            return;
        }

        let preview = if incoming.text.chars().count() > 50 {
            let truncated: String = incoming.text.chars().take(50).collect();
            format!("{truncated}...")
        } else {
            incoming.text.clone()
        };
        info!("[{}] {} says: {}", incoming.channel, incoming.sender_id, preview);

        // --- 1. PENDING PROMPT TEXT ---
        // Checked before commands: whatever arrives is the new prompt.
        if self.sessions.take(&incoming.sender_id) == SessionState::AwaitingPromptText {
            self.store_prompt(&incoming).await;
            return;
        }

        // --- 2. COMMANDS ---
        if let Some(cmd) = Command::parse(&incoming.text) {
            let ctx = CommandContext {
                history: &self.history,
                prompts: &self.prompts,
                sessions: &self.sessions,
                sender_id: &incoming.sender_id,
                lang: &self.language,
            };
            let reply = commands::handle(cmd, &ctx).await;
            self.send_text(&incoming, &reply).await;
            return;
        }

        // --- 3. CHAT ---
        self.chat(&incoming).await;
    }

    async fn store_prompt(&self, incoming: &IncomingMessage) {
        let reply = match self
            .prompts
            .set_override(&incoming.sender_id, &incoming.text)
            .await
        {
            Ok(()) => {
                info!("prompt updated for {}", incoming.sender_id);
                i18n::t("prompt_updated", &self.language)
            }
            Err(e) => {
                error!("failed to store prompt for {}: {e}", incoming.sender_id);
                i18n::t("storage_failed", &self.language)
            }
        };
        self.send_text(incoming, reply).await;
    }

    /// Default flow: history + prompt, one completion, save, reply.
    async fn chat(&self, incoming: &IncomingMessage) {
        let turn = Turn::user(incoming.text.clone());
        self.converse(incoming, turn, Vec::new(), "completion_failed").await;
    }

    /// Download an image, keep it on disk, and ask the provider to describe it.
    async fn describe_image(&self, incoming: &IncomingMessage, attachment: &Attachment) {
        let user = incoming.sender_id.as_str();
        let data = match self.channel.download(attachment).await {
            Ok(data) => data,
            Err(e) => {
                error!("image download failed for {user}: {e}");
                self.send_text(incoming, i18n::t("image_failed", &self.language))
                    .await;
                return;
            }
        };

        let images = self.history.images();
        let path = match images.save(user, &attachment.content_id, &data).await {
            Ok(path) => path,
            Err(e) => {
                error!("failed to store image for {user}: {e}");
                self.send_text(incoming, i18n::t("image_failed", &self.language))
                    .await;
                return;
            }
        };

        let instruction = i18n::t("describe_image", &self.language);
        let turn = Turn::user(instruction).with_images(vec![path.clone()]);
        let image = ImageData::from_bytes(data);
        if !self
            .converse(incoming, turn, vec![image], "image_failed")
            .await
        {
            // Nothing in history points at the file.
            images.remove(&path).await;
        }
    }

    /// One exchange: send `user_turn` with history and prompt, reply, and
    /// record both turns. Returns whether the exchange reached history.
    async fn converse(
        &self,
        incoming: &IncomingMessage,
        user_turn: Turn,
        images: Vec<ImageData>,
        failure_key: &str,
    ) -> bool {
        let user = incoming.sender_id.as_str();
        let history = self.history.load(user).await;
        let system_prompt = self.prompts.effective_prompt(user).await;

        let context = Context::new(&user_turn.content)
            .with_system_prompt(system_prompt)
            .with_history(self.history_context(&history).await)
            .with_images(images);

        let response = match self.provider.complete(&context).await {
            Ok(resp) => resp,
            Err(e) => {
                error!("completion failed for {user}: {e}");
                self.send_text(incoming, i18n::t(failure_key, &self.language))
                    .await;
                return false;
            }
        };

        if response.text.trim().is_empty() {
            warn!("{} returned an empty completion for {user}", self.provider.name());
            self.send_text(incoming, i18n::t("empty_completion", &self.language))
                .await;
            return false;
        }

        info!(
            "{} replied to {user} in {}ms ({} tokens)",
            response.metadata.provider_used,
            response.metadata.processing_time_ms,
            response
                .metadata
                .tokens_used
                .map_or_else(|| "?".to_string(), |t| t.to_string())
        );

        let mut turns = history;
        turns.push(user_turn);
        turns.push(Turn::assistant(response.text.clone()));
        let saved = match self.history.save(user, turns).await {
            Ok(_) => true,
            Err(e) => {
                error!("failed to save history for {user}: {e}");
                false
            }
        };

        let mut reply = response;
        reply.reply_target = Some(incoming.sender_id.clone());
        reply.reply_token = incoming.reply_token.clone();
        self.deliver(reply).await;
        saved
    }

    /// History as provider context, with saved images loaded back in.
    /// A vanished image leaves a marker in the turn text instead.
    async fn history_context(&self, turns: &[Turn]) -> Vec<ContextEntry> {
        let mut entries = Vec::with_capacity(turns.len());
        for turn in turns {
            let mut entry = ContextEntry::from(turn);
            for path in &turn.images {
                match self.history.images().load(path).await {
                    Some(image) => entry.images.push(image),
                    None => {
                        entry.content.push('\n');
                        entry
                            .content
                            .push_str(i18n::t("image_missing", &self.language));
                    }
                }
            }
            entries.push(entry);
        }
        entries
    }
}
