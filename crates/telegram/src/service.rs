//! Update dispatcher and command handlers.
//!
//! [`BotService`] owns all mutable bot state: the admin registry, the
//! access gate with its denial log, conversation states, and staged codes.
//! Every inbound update goes through [`BotService::handle_update`]:
//! access check, then conversation routing, then command dispatch.

use std::sync::{Arc, RwLock};

use {
    eanbot_barcode::BarcodeRenderer,
    eanbot_config::{BotConfig, ConfigStore, LogLevel},
    tracing::{debug, error, info, warn},
};

use crate::{
    access::AccessControl,
    admins::{AdminError, AdminRegistry},
    codes::{CodeStore, is_valid_code},
    commands::{Command, ParsedCommand},
    conversation::{CodeInput, Conversations},
    error::{Error, Result},
    format::escape_html,
    outbound::{Outbound, SendOptions},
    update::{ConversationKey, InboundUpdate, Sender, UpdateKind},
};

/// Applies a new log level at runtime.
pub trait LogLevelControl: Send + Sync {
    fn set_level(&self, level: LogLevel) -> anyhow::Result<()>;
}

const ADMIN_ONLY_MSG: &str = "This command is only available to administrators.";

pub struct BotService {
    admins: Arc<AdminRegistry>,
    access: AccessControl,
    conversations: Conversations,
    codes: CodeStore,
    renderer: Arc<dyn BarcodeRenderer>,
    config: Arc<dyn ConfigStore>,
    log_control: Option<Arc<dyn LogLevelControl>>,
    bot_username: RwLock<Option<String>>,
}

impl BotService {
    pub fn new(
        initial: &BotConfig,
        config: Arc<dyn ConfigStore>,
        renderer: Arc<dyn BarcodeRenderer>,
    ) -> Self {
        Self {
            admins: Arc::new(AdminRegistry::new(
                initial.admin_ids.clone(),
                Arc::clone(&config),
            )),
            access: AccessControl::new(),
            conversations: Conversations::new(),
            codes: CodeStore::new(),
            renderer,
            config,
            log_control: None,
            bot_username: RwLock::new(None),
        }
    }

    pub fn with_log_control(mut self, control: Arc<dyn LogLevelControl>) -> Self {
        self.log_control = Some(control);
        self
    }

    /// Set once the bot identity is known, to recognise `/cmd@botname`.
    pub fn set_bot_username(&self, username: Option<String>) {
        let mut current = self.bot_username.write().unwrap_or_else(|e| e.into_inner());
        *current = username;
    }

    pub fn admins(&self) -> &AdminRegistry {
        &self.admins
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn codes(&self) -> &CodeStore {
        &self.codes
    }

    pub fn conversations(&self) -> &Conversations {
        &self.conversations
    }

    /// Process one inbound update to completion.
    pub async fn handle_update(&self, update: InboundUpdate, outbound: &dyn Outbound) -> Result<()> {
        if self.access.check(&update, &self.admins).is_err() {
            return Ok(());
        }

        let (Some(sender), Some(key)) = (update.sender.as_ref(), update.conversation()) else {
            warn!(
                chat_id = update.chat_id,
                message_id = update.message_id,
                "update without sender, ignoring"
            );
            return Ok(());
        };

        if update.kind == UpdateKind::EditedMessage {
            debug!(chat_id = update.chat_id, "ignoring edited message");
            return Ok(());
        }

        let Some(text) = update.text.as_deref() else {
            debug!(chat_id = update.chat_id, "ignoring message without text");
            return Ok(());
        };

        let username = self
            .bot_username
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let command = Command::parse(text, username.as_deref());

        // `/cancel` must see the session it cancels, so it skips the
        // state machine's interrupt path.
        if !matches!(command, Some(ParsedCommand::Known(Command::Cancel))) {
            match self.conversations.submit_text(key, text, &self.codes) {
                CodeInput::Stored(count) => return self.codes_stored(&update, count, outbound).await,
                CodeInput::Unparseable => return self.codes_unparseable(&update, outbound).await,
                CodeInput::Interrupted | CodeInput::NotWaiting => {},
            }
        }

        match command {
            Some(ParsedCommand::Known(cmd)) => self.dispatch(cmd, &update, sender, key, outbound).await,
            Some(ParsedCommand::Unknown(name)) => {
                debug!(command = %name, chat_id = update.chat_id, "ignoring unrecognized command");
                Ok(())
            },
            None => {
                debug!(chat_id = update.chat_id, "ignoring plain text outside a session");
                Ok(())
            },
        }
    }

    async fn dispatch(
        &self,
        cmd: Command,
        update: &InboundUpdate,
        sender: &Sender,
        key: ConversationKey,
        outbound: &dyn Outbound,
    ) -> Result<()> {
        debug!(
            command = cmd.name(),
            user_id = sender.id,
            chat_id = update.chat_id,
            chat_type = ?update.chat_type,
            "dispatching command"
        );

        if cmd.is_admin_only() && !self.admins.contains(sender.id) {
            return reply(outbound, update, ADMIN_ONLY_MSG, false).await;
        }

        match cmd {
            Command::Start => {
                outbound
                    .send_text(
                        update.chat_id,
                        "Hello! Use /help to see the available commands.",
                        SendOptions::default(),
                    )
                    .await
            },
            Command::Help => {
                let text = help_text(self.admins.contains(sender.id));
                outbound
                    .send_text(update.chat_id, &text, SendOptions::html())
                    .await
            },
            Command::Codes => {
                self.conversations.begin_code_staging(key, &self.codes);
                reply(
                    outbound,
                    update,
                    "Send a list of EAN codes (12 or 13 digits).\nSeparators: space, comma, new line.\nThe list is temporary. Cancel input with /cancel.",
                    false,
                )
                .await
            },
            Command::MyCodes => self.my_codes(update, sender, outbound).await,
            Command::Gen(arg) => self.generate(update, sender, arg, outbound).await,
            Command::Cancel => {
                let text = if self.conversations.cancel(key) {
                    "Operation cancelled."
                } else {
                    "Nothing to cancel."
                };
                outbound
                    .send_text(update.chat_id, text, SendOptions::default())
                    .await
            },
            Command::Unauthorized(arg) => self.unauthorized(update, arg, outbound).await,
            Command::AddAdmin(arg) => self.add_admin(update, sender, arg, outbound).await,
            Command::DelAdmin(arg) => self.del_admin(update, sender, arg, outbound).await,
            Command::ReloadConfig => self.reload_config(update, sender, outbound).await,
        }
    }

    async fn codes_stored(
        &self,
        update: &InboundUpdate,
        count: usize,
        outbound: &dyn Outbound,
    ) -> Result<()> {
        info!(chat_id = update.chat_id, count, "codes staged");
        let text = format!("Codes loaded ({count}).\nNow use /gen to generate barcodes.");
        reply(outbound, update, &text, false).await
    }

    async fn codes_unparseable(&self, update: &InboundUpdate, outbound: &dyn Outbound) -> Result<()> {
        reply(
            outbound,
            update,
            "Could not recognize any codes. Make sure they are 12 or 13 digits separated by spaces, commas or new lines.",
            false,
        )
        .await
    }

    async fn my_codes(
        &self,
        update: &InboundUpdate,
        sender: &Sender,
        outbound: &dyn Outbound,
    ) -> Result<()> {
        let codes = self.codes.get(sender.id);
        if codes.is_empty() {
            return reply(
                outbound,
                update,
                "You have no staged EAN codes. Use /codes to load some.",
                false,
            )
            .await;
        }
        let text = format!(
            "Your staged EAN codes ({}):\n<code>{}</code>",
            codes.len(),
            codes.join("\n")
        );
        reply(outbound, update, &text, true).await
    }

    async fn generate(
        &self,
        update: &InboundUpdate,
        sender: &Sender,
        arg: Option<String>,
        outbound: &dyn Outbound,
    ) -> Result<()> {
        let code = match arg {
            Some(arg) if is_valid_code(&arg) => arg,
            Some(_) => {
                return reply(
                    outbound,
                    update,
                    "Please pass a valid EAN code (12 or 13 digits) after /gen, for example: <code>/gen 123456789012</code>",
                    true,
                )
                .await;
            },
            None if update.is_direct() => match self.codes.pick_random(sender.id) {
                Some(code) => code,
                None => {
                    return reply(
                        outbound,
                        update,
                        "Pass an EAN code (for example <code>/gen 123456789012</code>) or load a list with /codes.",
                        true,
                    )
                    .await;
                },
            },
            None => {
                return reply(
                    outbound,
                    update,
                    "In group chats the code must be given explicitly: <code>/gen &lt;code&gt;</code>",
                    true,
                )
                .await;
            },
        };

        let png = match self.renderer.render(&code) {
            Ok(png) => png,
            Err(e) => {
                error!(code, error = %e, "barcode generation failed");
                let text = match e {
                    eanbot_barcode::Error::InvalidFormat { .. }
                    | eanbot_barcode::Error::ChecksumMismatch { .. } => format!(
                        "Could not generate a barcode for <code>{code}</code>. Check the code (12 or 13 digits with a valid check digit)."
                    ),
                    eanbot_barcode::Error::External { .. } => format!(
                        "An error occurred while generating the barcode for <code>{code}</code>."
                    ),
                };
                return reply(outbound, update, &text, true).await;
            },
        };

        let caption = format!("Barcode for: <code>{code}</code>");
        let opts = SendOptions::html().reply_to(update.message_id);
        if let Err(e) = outbound.send_photo(update.chat_id, png, &caption, opts).await {
            error!(code, error = %e, "failed to send barcode image");
            let text = format!("Could not send the barcode for <code>{code}</code>.");
            return reply(outbound, update, &text, true).await;
        }
        Ok(())
    }

    async fn unauthorized(
        &self,
        update: &InboundUpdate,
        arg: Option<String>,
        outbound: &dyn Outbound,
    ) -> Result<()> {
        match arg.as_deref() {
            None => {},
            Some(a) if a.eq_ignore_ascii_case("clear") => {
                let count = self.access.clear();
                info!(count, "unauthorized attempts cleared");
                let text = format!("Cleared {count} unauthorized access record(s).");
                return reply(outbound, update, &text, false).await;
            },
            Some(_) => {
                return reply(
                    outbound,
                    update,
                    "Usage: <code>/unauthorized [clear]</code>",
                    true,
                )
                .await;
            },
        }

        let attempts = self.access.attempts();
        if attempts.is_empty() {
            return reply(
                outbound,
                update,
                "No unauthorized access attempts recorded.",
                false,
            )
            .await;
        }

        let mut text = String::from("<b>Unauthorized access attempts:</b>\n");
        for (user_id, info) in &attempts {
            let username = info.username.as_deref().unwrap_or("N/A");
            let full_name = if info.full_name.is_empty() {
                "N/A"
            } else {
                info.full_name.as_str()
            };
            text.push_str(&format!(
                "\n<b>ID:</b> <code>{user_id}</code>\n  Username: <code>@{}</code>\n  Full Name: {}\n  Attempts: {}\n  Chat ID: {}\n",
                escape_html(username),
                escape_html(full_name),
                info.attempts,
                info.chat_id,
            ));
        }
        outbound
            .send_text(update.chat_id, &text, SendOptions::html())
            .await
    }

    async fn add_admin(
        &self,
        update: &InboundUpdate,
        sender: &Sender,
        arg: Option<String>,
        outbound: &dyn Outbound,
    ) -> Result<()> {
        let Some(arg) = arg else {
            return reply(outbound, update, "Usage: <code>/addadmin [user_id]</code>", true).await;
        };
        let invalid = "Invalid user id. The id must be a positive integer.";
        let Ok(id) = first_word(&arg).parse::<i64>() else {
            return reply(outbound, update, invalid, false).await;
        };

        let admins = Arc::clone(&self.admins);
        let added = tokio::task::spawn_blocking(move || admins.add(id))
            .await
            .map_err(|e| Error::blocking("admin add", e))?;
        let text = match added {
            Ok(()) => {
                info!(admin_id = id, added_by = sender.id, "admin added via command");
                format!(
                    "User <code>{id}</code> is now an administrator.\nThe change has been saved to the configuration."
                )
            },
            Err(AdminError::InvalidId) => invalid.to_string(),
            Err(AdminError::AlreadyAdmin(_)) => {
                format!("User <code>{id}</code> is already an administrator.")
            },
            Err(AdminError::Persist(_)) => {
                "Failed to save the configuration. The administrator was not added.".to_string()
            },
            Err(e @ (AdminError::NotAdmin(_) | AdminError::SelfRemoval)) => {
                escape_html(&e.to_string())
            },
        };
        reply(outbound, update, &text, true).await
    }

    async fn del_admin(
        &self,
        update: &InboundUpdate,
        sender: &Sender,
        arg: Option<String>,
        outbound: &dyn Outbound,
    ) -> Result<()> {
        let Some(arg) = arg else {
            return reply(outbound, update, "Usage: <code>/deladmin [user_id]</code>", true).await;
        };
        let Ok(id) = first_word(&arg).parse::<i64>() else {
            return reply(
                outbound,
                update,
                "Invalid user id. The id must be a number.",
                false,
            )
            .await;
        };

        let (admins, actor) = (Arc::clone(&self.admins), sender.id);
        let removed = tokio::task::spawn_blocking(move || admins.remove(actor, id))
            .await
            .map_err(|e| Error::blocking("admin removal", e))?;
        let text = match removed {
            Ok(()) => format!(
                "User <code>{id}</code> is no longer an administrator.\nThe change has been saved to the configuration."
            ),
            Err(AdminError::SelfRemoval) => {
                "You cannot remove yourself from the administrators.".to_string()
            },
            Err(AdminError::NotAdmin(_)) => {
                format!("User <code>{id}</code> is not an administrator.")
            },
            Err(AdminError::Persist(_)) => {
                "Failed to save the configuration. The administrator was not removed.".to_string()
            },
            Err(e @ (AdminError::InvalidId | AdminError::AlreadyAdmin(_))) => {
                escape_html(&e.to_string())
            },
        };
        reply(outbound, update, &text, true).await
    }

    async fn reload_config(
        &self,
        update: &InboundUpdate,
        sender: &Sender,
        outbound: &dyn Outbound,
    ) -> Result<()> {
        let (admins, store) = (Arc::clone(&self.admins), Arc::clone(&self.config));
        let loaded = tokio::task::spawn_blocking(move || {
            let config = store.load()?;
            admins.replace(config.admin_ids.clone());
            Ok::<_, eanbot_config::Error>(config)
        })
        .await
        .map_err(|e| Error::blocking("config reload", e))?;
        let config = match loaded {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "failed to reload config");
                let text = format!(
                    "Failed to reload the configuration: {}",
                    escape_html(&e.to_string())
                );
                return reply(outbound, update, &text, true).await;
            },
        };

        let mut text = String::from("Configuration reloaded from file.");
        if let Some(control) = &self.log_control {
            match control.set_level(config.log_level) {
                Ok(()) => text.push_str(&format!(" Log level: {}.", config.log_level)),
                Err(e) => {
                    warn!(error = %e, log_level = %config.log_level, "failed to apply log level");
                    text.push_str(" The log level could not be applied.");
                },
            }
        }
        info!(
            reloaded_by = sender.id,
            admin_ids = ?self.admins.ids(),
            log_level = %config.log_level,
            "config reloaded"
        );
        reply(outbound, update, &text, true).await
    }
}

/// Reply in the update's chat, threaded onto the triggering message.
async fn reply(
    outbound: &dyn Outbound,
    update: &InboundUpdate,
    text: &str,
    html: bool,
) -> Result<()> {
    let opts = SendOptions {
        html,
        reply_to: Some(update.message_id),
    };
    outbound.send_text(update.chat_id, text, opts).await
}

fn first_word(arg: &str) -> &str {
    arg.split_whitespace().next().unwrap_or("")
}

fn help_text(is_admin: bool) -> String {
    let mut parts = vec![
        "<b>Available commands:</b>",
        "/start - Greeting",
        "/help - Show this message",
        "/codes - Stage a temporary list of EAN codes (12 or 13 digits).",
        "  Separate codes with spaces, commas or new lines.",
        "  /gen uses this list when called without a code.",
        "/gen <code>[code]</code> - Generate a barcode for the given EAN.",
        "  Without <code>[code]</code>, a random code from your staged list is used.",
        "/mycodes - Show your staged codes.",
        "/cancel - Cancel the current operation (e.g. code input).",
    ];
    if is_admin {
        parts.extend([
            "\n<b>Administrator commands:</b>",
            "/unauthorized - Show unauthorized access attempts (<code>clear</code> resets them).",
            "/addadmin <code>[user_id]</code> - Add an administrator.",
            "/deladmin <code>[user_id]</code> - Remove an administrator.",
            "/reloadcfg - Reload the configuration from file.",
        ]);
    }
    parts.join("\n")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;
    use crate::{
        admins::testing::MemoryStore,
        outbound::testing::{RecordingOutbound, Sent},
        update::{ChatType, fixtures::*},
    };

    const ADMIN: i64 = 1;
    const OTHER_ADMIN: i64 = 2;
    const STRANGER: i64 = 9;
    const GROUP: i64 = -100;

    /// Renderer double recording every code it is asked to render.
    #[derive(Default)]
    struct RecordingRenderer {
        calls: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    impl BarcodeRenderer for RecordingRenderer {
        fn render(&self, code: &str) -> eanbot_barcode::Result<Vec<u8>> {
            self.calls.lock().unwrap().push(code.to_string());
            if self.fail.load(Ordering::SeqCst) {
                return Err(eanbot_barcode::Error::external(
                    "encoder",
                    std::io::Error::other("boom"),
                ));
            }
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    #[derive(Default)]
    struct RecordingLogControl {
        levels: Mutex<Vec<LogLevel>>,
    }

    impl LogLevelControl for RecordingLogControl {
        fn set_level(&self, level: LogLevel) -> anyhow::Result<()> {
            self.levels.lock().unwrap().push(level);
            Ok(())
        }
    }

    struct Harness {
        service: BotService,
        store: Arc<MemoryStore>,
        renderer: Arc<RecordingRenderer>,
        log: Arc<RecordingLogControl>,
        out: RecordingOutbound,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::default());
            let renderer = Arc::new(RecordingRenderer::default());
            let log = Arc::new(RecordingLogControl::default());
            let initial = BotConfig {
                admin_ids: vec![ADMIN, OTHER_ADMIN],
                ..Default::default()
            };
            let service = BotService::new(&initial, store.clone(), renderer.clone())
                .with_log_control(log.clone());
            service.set_bot_username(Some("ean_bot".into()));
            Self {
                service,
                store,
                renderer,
                log,
                out: RecordingOutbound::default(),
            }
        }

        async fn send(&self, update: InboundUpdate) {
            self.service
                .handle_update(update, &self.out)
                .await
                .unwrap();
        }

        async fn dm(&self, user: i64, text: &str) {
            self.send(dm(user, text)).await;
        }

        /// Send and return the texts of the replies.
        async fn ask(&self, user: i64, text: &str) -> Vec<String> {
            self.dm(user, text).await;
            self.out.texts()
        }

        fn rendered(&self) -> Vec<String> {
            self.renderer.calls.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn start_and_help() {
        let h = Harness::new();
        let replies = h.ask(ADMIN, "/start").await;
        assert_eq!(replies, vec!["Hello! Use /help to see the available commands."]);

        let replies = h.ask(ADMIN, "/help").await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("/codes"));
        assert!(replies[0].contains("Administrator commands"));
    }

    #[tokio::test]
    async fn help_in_group_hides_admin_section_for_non_admins() {
        let h = Harness::new();
        h.send(group(STRANGER, GROUP, "/help")).await;
        let replies = h.out.texts();
        assert_eq!(replies.len(), 1);
        assert!(!replies[0].contains("Administrator commands"));
    }

    #[tokio::test]
    async fn denied_dm_is_silent_and_recorded() {
        let h = Harness::new();
        for _ in 0..3 {
            h.dm(STRANGER, "/start").await;
        }
        assert!(h.out.take().is_empty());
        assert!(h.rendered().is_empty());

        let attempts = h.service.access().attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].0, STRANGER.to_string());
        assert_eq!(attempts[0].1.attempts, 3);
    }

    #[tokio::test]
    async fn denied_dm_never_reaches_state_machine() {
        let h = Harness::new();
        h.dm(STRANGER, "/codes").await;
        h.dm(STRANGER, "111111111111").await;
        assert!(h.service.codes().get(STRANGER).is_empty());
        assert!(h.out.take().is_empty());
    }

    #[tokio::test]
    async fn staged_codes_round_trip_through_mycodes() {
        let h = Harness::new();
        h.dm(ADMIN, "/codes").await;
        h.out.take();
        let replies = h.ask(ADMIN, "222222222222, 111111111111\n3333333333333").await;
        assert_eq!(replies, vec![
            "Codes loaded (3).\nNow use /gen to generate barcodes."
        ]);

        let replies = h.ask(ADMIN, "/mycodes").await;
        assert_eq!(replies, vec![
            "Your staged EAN codes (3):\n<code>222222222222\n111111111111\n3333333333333</code>"
        ]);
    }

    #[tokio::test]
    async fn unparseable_input_keeps_waiting() {
        let h = Harness::new();
        h.dm(ADMIN, "/codes").await;
        h.out.take();

        let replies = h.ask(ADMIN, "abc 123").await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with("Could not recognize any codes"));

        let replies = h.ask(ADMIN, "111111111111").await;
        assert_eq!(replies, vec![
            "Codes loaded (1).\nNow use /gen to generate barcodes."
        ]);
    }

    #[tokio::test]
    async fn command_during_staging_aborts_and_runs_command() {
        let h = Harness::new();
        h.dm(ADMIN, "/codes").await;
        h.out.take();

        let replies = h.ask(ADMIN, "/mycodes").await;
        assert_eq!(replies, vec![
            "You have no staged EAN codes. Use /codes to load some."
        ]);

        // The session is gone: plain text is ignored now.
        assert!(h.ask(ADMIN, "111111111111").await.is_empty());
        assert!(h.service.codes().get(ADMIN).is_empty());
    }

    #[tokio::test]
    async fn unknown_command_during_staging_aborts_silently() {
        let h = Harness::new();
        h.dm(ADMIN, "/codes").await;
        h.out.take();

        assert!(h.ask(ADMIN, "/whatever").await.is_empty());
        assert!(h.ask(ADMIN, "111111111111").await.is_empty());
    }

    #[tokio::test]
    async fn second_codes_discards_first_session() {
        let h = Harness::new();
        h.dm(ADMIN, "/codes").await;
        h.dm(ADMIN, "111111111111").await;
        assert_eq!(h.service.codes().get(ADMIN), vec!["111111111111"]);

        h.dm(ADMIN, "/codes").await;
        assert!(h.service.codes().get(ADMIN).is_empty());
        h.dm(ADMIN, "/codes").await;
        h.out.take();

        let replies = h.ask(ADMIN, "222222222222").await;
        assert_eq!(replies, vec![
            "Codes loaded (1).\nNow use /gen to generate barcodes."
        ]);
        assert_eq!(h.service.codes().get(ADMIN), vec!["222222222222"]);
    }

    #[tokio::test]
    async fn cancel_with_and_without_session() {
        let h = Harness::new();
        assert_eq!(h.ask(ADMIN, "/cancel").await, vec!["Nothing to cancel."]);

        h.dm(ADMIN, "/codes").await;
        h.out.take();
        assert_eq!(h.ask(ADMIN, "/cancel").await, vec!["Operation cancelled."]);
        assert!(h.ask(ADMIN, "111111111111").await.is_empty());
    }

    #[tokio::test]
    async fn gen_with_explicit_code_renders_exactly_that_code() {
        let h = Harness::new();
        h.dm(ADMIN, "/gen 123456789012").await;
        assert_eq!(h.rendered(), vec!["123456789012"]);

        let sent = h.out.take();
        assert_eq!(sent, vec![Sent::Photo {
            chat_id: ADMIN,
            size: 4,
            caption: "Barcode for: <code>123456789012</code>".into(),
            opts: SendOptions::html().reply_to(1),
        }]);
    }

    #[tokio::test]
    async fn gen_with_malformed_code_never_renders() {
        let h = Harness::new();
        let replies = h.ask(ADMIN, "/gen 12AB").await;
        assert!(h.rendered().is_empty());
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with("Please pass a valid EAN code"));
    }

    #[tokio::test]
    async fn gen_without_code_picks_from_staged_list() {
        let h = Harness::new();
        h.dm(ADMIN, "/codes").await;
        h.dm(ADMIN, "111111111111 222222222222").await;
        h.out.take();

        for _ in 0..5 {
            h.dm(ADMIN, "/gen").await;
        }
        let rendered = h.rendered();
        assert_eq!(rendered.len(), 5);
        assert!(
            rendered
                .iter()
                .all(|c| c == "111111111111" || c == "222222222222")
        );
        // Generation does not consume staged codes.
        assert_eq!(h.service.codes().get(ADMIN).len(), 2);
    }

    #[tokio::test]
    async fn gen_without_code_or_staged_list_explains() {
        let h = Harness::new();
        let replies = h.ask(ADMIN, "/gen").await;
        assert!(h.rendered().is_empty());
        assert!(replies[0].starts_with("Pass an EAN code"));
    }

    #[tokio::test]
    async fn gen_in_group_requires_explicit_code() {
        let h = Harness::new();
        h.send(group(ADMIN, GROUP, "/codes")).await;
        h.send(group(ADMIN, GROUP, "111111111111")).await;
        h.out.take();

        h.send(group(ADMIN, GROUP, "/gen")).await;
        assert!(h.rendered().is_empty());
        let replies = h.out.texts();
        assert!(replies[0].starts_with("In group chats the code must be given explicitly"));

        h.send(group(STRANGER, GROUP, "/gen@ean_bot 111111111111")).await;
        assert_eq!(h.rendered(), vec!["111111111111"]);
    }

    #[tokio::test]
    async fn render_failure_is_reported_to_user() {
        let h = Harness::new();
        h.renderer.fail.store(true, Ordering::SeqCst);
        let replies = h.ask(ADMIN, "/gen 123456789012").await;
        assert_eq!(replies, vec![
            "An error occurred while generating the barcode for <code>123456789012</code>."
        ]);
    }

    #[tokio::test]
    async fn checksum_rejection_from_real_renderer_is_reported() {
        let store = Arc::new(MemoryStore::default());
        let initial = BotConfig {
            admin_ids: vec![ADMIN],
            ..Default::default()
        };
        let service = BotService::new(
            &initial,
            store,
            Arc::new(eanbot_barcode::Ean13Renderer::default()),
        );
        let out = RecordingOutbound::default();
        service
            .handle_update(dm(ADMIN, "/gen 4006381333932"), &out)
            .await
            .unwrap();
        let replies = out.texts();
        assert!(replies[0].starts_with("Could not generate a barcode"));

        service
            .handle_update(dm(ADMIN, "/gen 4006381333931"), &out)
            .await
            .unwrap();
        assert!(matches!(out.take().as_slice(), [Sent::Photo { size, .. }] if *size > 0));
    }

    #[tokio::test]
    async fn group_plain_text_is_ignored() {
        let h = Harness::new();
        h.send(group(STRANGER, GROUP, "hello everyone")).await;
        assert!(h.out.take().is_empty());
        assert!(h.service.access().attempts().is_empty());
    }

    #[tokio::test]
    async fn group_staging_is_independent_from_dm() {
        let h = Harness::new();
        h.send(group(ADMIN, GROUP, "/codes")).await;
        h.out.take();

        // Plain text in the DM is not code input.
        assert!(h.ask(ADMIN, "111111111111").await.is_empty());

        h.send(group(ADMIN, GROUP, "222222222222")).await;
        assert_eq!(h.service.codes().get(ADMIN), vec!["222222222222"]);
    }

    #[tokio::test]
    async fn edited_messages_are_gated_but_not_dispatched() {
        let h = Harness::new();
        let mut edit = dm(STRANGER, "/start");
        edit.kind = UpdateKind::EditedMessage;
        h.send(edit).await;
        assert_eq!(h.service.access().attempts()[0].1.attempts, 1);

        let mut edit = dm(ADMIN, "/start");
        edit.kind = UpdateKind::EditedMessage;
        h.send(edit).await;
        assert!(h.out.take().is_empty());
    }

    #[tokio::test]
    async fn textless_messages_are_gated_before_being_dropped() {
        let h = Harness::new();
        let mut sticker = dm(STRANGER, "");
        sticker.text = None;
        h.send(sticker).await;
        h.send(dm(STRANGER, "/start")).await;
        assert_eq!(h.service.access().attempts()[0].1.attempts, 2);

        let mut sticker = dm(ADMIN, "");
        sticker.text = None;
        h.send(sticker).await;
        assert!(h.out.take().is_empty());
    }

    #[tokio::test]
    async fn updates_without_sender_are_dropped() {
        let h = Harness::new();
        h.send(InboundUpdate {
            kind: UpdateKind::Message,
            message_id: 3,
            chat_id: GROUP,
            chat_type: ChatType::Channel,
            sender: None,
            text: Some("/start".into()),
        })
        .await;
        assert!(h.out.take().is_empty());
    }

    #[tokio::test]
    async fn admin_commands_refused_for_non_admins_in_groups() {
        let h = Harness::new();
        h.send(group(STRANGER, GROUP, "/addadmin 9")).await;
        assert_eq!(h.out.texts(), vec![ADMIN_ONLY_MSG]);
        assert!(!h.service.admins().contains(STRANGER));
    }

    #[tokio::test]
    async fn addadmin_persists_and_admits() {
        let h = Harness::new();
        let replies = h.ask(ADMIN, "/addadmin 9").await;
        assert!(replies[0].contains("is now an administrator"));
        assert_eq!(*h.store.saved.lock().unwrap(), vec![vec![ADMIN, OTHER_ADMIN, 9]]);

        assert_eq!(
            h.ask(STRANGER, "/start").await,
            vec!["Hello! Use /help to see the available commands."]
        );
    }

    #[tokio::test]
    async fn admin_changes_persist_off_the_runtime_thread() {
        let h = Harness::new();
        h.ask(ADMIN, "/addadmin 9").await;
        h.ask(ADMIN, "/deladmin 9").await;

        let runtime_thread = std::thread::current().id();
        let threads = h.store.persist_threads.lock().unwrap().clone();
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|t| *t != runtime_thread));
    }

    #[tokio::test]
    async fn addadmin_rolls_back_on_persist_failure() {
        let h = Harness::new();
        h.store.failing(true);
        let before = h.service.admins().ids();

        let replies = h.ask(ADMIN, "/addadmin 9").await;
        assert_eq!(replies, vec![
            "Failed to save the configuration. The administrator was not added."
        ]);
        assert_eq!(h.service.admins().ids(), before);
        assert!(h.ask(STRANGER, "/start").await.is_empty());
    }

    #[tokio::test]
    async fn addadmin_validates_argument() {
        let h = Harness::new();
        assert!(h.ask(ADMIN, "/addadmin").await[0].starts_with("Usage"));
        assert!(h.ask(ADMIN, "/addadmin abc").await[0].starts_with("Invalid user id"));
        assert!(h.ask(ADMIN, "/addadmin -3").await[0].starts_with("Invalid user id"));
        assert!(h.ask(ADMIN, "/addadmin 2").await[0].contains("already an administrator"));
        assert!(h.store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deladmin_refuses_self_removal() {
        let h = Harness::new();
        let replies = h.ask(ADMIN, &format!("/deladmin {ADMIN}")).await;
        assert_eq!(replies, vec!["You cannot remove yourself from the administrators."]);
        assert_eq!(h.service.admins().ids(), vec![ADMIN, OTHER_ADMIN]);
        assert!(h.store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deladmin_removes_and_rolls_back() {
        let h = Harness::new();
        h.store.failing(true);
        let replies = h.ask(ADMIN, "/deladmin 2").await;
        assert!(replies[0].contains("was not removed"));
        assert!(h.service.admins().contains(OTHER_ADMIN));

        h.store.failing(false);
        let replies = h.ask(ADMIN, "/deladmin 2").await;
        assert!(replies[0].contains("is no longer an administrator"));
        assert!(!h.service.admins().contains(OTHER_ADMIN));

        assert!(h.ask(ADMIN, "/deladmin 77").await[0].contains("is not an administrator"));
        assert!(h.ask(ADMIN, "/deladmin x").await[0].starts_with("Invalid user id"));
    }

    #[tokio::test]
    async fn unauthorized_lists_and_clears() {
        let h = Harness::new();
        assert_eq!(
            h.ask(ADMIN, "/unauthorized").await,
            vec!["No unauthorized access attempts recorded."]
        );

        h.dm(STRANGER, "hi").await;
        let mut probe = dm(STRANGER, "hi again");
        if let Some(sender) = probe.sender.as_mut() {
            sender.full_name = "<Eve>".into();
        }
        h.send(probe).await;

        let replies = h.ask(ADMIN, "/unauthorized").await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("<code>9</code>"));
        assert!(replies[0].contains("Attempts: 2"));
        assert!(replies[0].contains("@user9"));
        assert!(replies[0].contains("Full Name: &lt;Eve&gt;"));

        assert_eq!(
            h.ask(ADMIN, "/unauthorized clear").await,
            vec!["Cleared 1 unauthorized access record(s)."]
        );
        assert!(h.service.access().attempts().is_empty());
    }

    #[tokio::test]
    async fn reloadcfg_applies_admins_and_log_level() {
        let h = Harness::new();
        {
            let mut cfg = h.store.config.lock().unwrap();
            cfg.admin_ids = vec![ADMIN, 9];
            cfg.log_level = LogLevel::Warn;
        }

        let replies = h.ask(ADMIN, "/reloadcfg").await;
        assert_eq!(replies, vec![
            "Configuration reloaded from file. Log level: warn."
        ]);
        assert_eq!(h.service.admins().ids(), vec![ADMIN, 9]);
        assert_eq!(*h.log.levels.lock().unwrap(), vec![LogLevel::Warn]);
    }

    #[tokio::test]
    async fn reloadcfg_failure_keeps_state() {
        let h = Harness::new();
        h.store.fail_load.store(true, Ordering::SeqCst);
        let replies = h.ask(ADMIN, "/reloadcfg").await;
        assert!(replies[0].starts_with("Failed to reload the configuration"));
        assert_eq!(h.service.admins().ids(), vec![ADMIN, OTHER_ADMIN]);
        assert!(h.log.levels.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_commands_are_ignored() {
        let h = Harness::new();
        assert!(h.ask(ADMIN, "/frobnicate").await.is_empty());
        assert!(h.ask(ADMIN, "/gen@other_bot 123456789012").await.is_empty());
        assert!(h.rendered().is_empty());
    }
}
