//! Drains converted updates into the bot handler, one at a time.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::application::BotUpdateHandler;
use crate::domain::chat::InboundUpdate;

pub async fn run_consumer(
    mut updates: mpsc::Receiver<InboundUpdate>,
    handler: Arc<BotUpdateHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let update = tokio::select! {
            update = updates.recv() => match update {
                Some(update) => update,
                None => break,
            },
            _ = shutdown.changed() => break,
        };

        let chat_id = update.chat().id;
        let reaction = handler.handle(update).await;
        tracing::debug!(chat_id = %chat_id, ?reaction, "Update handled");
    }
    tracing::info!("Update consumer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::HELP_TEXT;
    use crate::application::test_support::Harness;
    use crate::domain::chat::{BotCommand, ChatRef, ChatUser};
    use crate::domain::foundation::{ChatId, ChatUserId};
    use crate::domain::groups::GroupKind;

    #[tokio::test]
    async fn handles_queued_updates_until_the_channel_closes() {
        let harness = Harness::new().await;
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(InboundUpdate::Command {
            chat: ChatRef {
                id: ChatId::new(7),
                kind: GroupKind::Private,
                title: None,
            },
            from: ChatUser {
                id: ChatUserId::new(7),
                is_bot: false,
                first_name: "Bia".into(),
                username: None,
            },
            command: BotCommand::Help,
        })
        .await
        .unwrap();
        drop(tx);

        run_consumer(rx, harness.bot.clone(), shutdown_rx).await;

        let sent = harness.gateway.messages_to(ChatUserId::new(7)).await;
        assert_eq!(sent, vec![HELP_TEXT.to_string()]);
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let harness = Harness::new().await;
        let (_tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let consumer = tokio::spawn(run_consumer(rx, harness.bot.clone(), shutdown_rx));
        shutdown_tx.send(true).unwrap();

        consumer.await.unwrap();
    }
}
