use std::{sync::Arc, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{commands, handlers, outbound::TelegramOutbound, service::BotService, update};

/// Long-poll timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u32 = 30;

/// Start polling with the given bot token.
///
/// Spawns a background task that processes updates one at a time until the
/// returned `CancellationToken` is cancelled.
pub async fn start_polling(
    token: &Secret<String>,
    service: Arc<BotService>,
) -> anyhow::Result<CancellationToken> {
    // Client timeout must exceed the long-poll timeout so the HTTP client
    // doesn't abort the request before Telegram responds.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(45))
        .build()?;
    let bot = Bot::with_client(token.expose_secret(), client);

    // Verify credentials and learn our username for `/cmd@name` matching.
    let me = bot.get_me().await?;
    let bot_username = me.username.clone();
    service.set_bot_username(bot_username.clone());

    // Delete any existing webhook so long polling works.
    bot.delete_webhook().send().await?;

    if let Err(e) = bot.set_my_commands(commands::bot_commands()).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(username = ?bot_username, "telegram bot connected (webhook cleared)");

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let outbound = TelegramOutbound::new(bot.clone());

    tokio::spawn(async move {
        info!("starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let request = bot
                .get_updates()
                .offset(offset)
                .timeout(POLL_TIMEOUT_SECS)
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::EditedMessage]);

            let result = tokio::select! {
                () = cancel_clone.cancelled() => break,
                result = request.send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for upd in updates {
                        offset = upd.id.as_offset();
                        let (msg, kind) = match upd.kind {
                            UpdateKind::Message(msg) => (msg, update::UpdateKind::Message),
                            UpdateKind::EditedMessage(msg) => {
                                (msg, update::UpdateKind::EditedMessage)
                            },
                            other => {
                                debug!("ignoring non-message update: {other:?}");
                                continue;
                            },
                        };
                        debug!(chat_id = msg.chat.id.0, ?kind, "received telegram message");
                        handlers::handle_message_direct(msg, kind, &service, &outbound).await;
                    }
                },
                Err(e) => {
                    // Another process is polling with the same token.
                    if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                        error!(
                            "telegram polling stopped: another instance is already running with this token"
                        );
                        cancel_clone.cancel();
                        break;
                    }

                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = cancel_clone.cancelled() => break,
                        () = tokio::time::sleep(Duration::from_secs(5)) => {},
                    }
                },
            }
        }
        info!("telegram polling stopped");
    });

    Ok(cancel)
}
