//! Update -> event conversion.
//!
//! Builds a core `InboundEvent` from a teloxide `Message` (fetching any
//! attachment through the Bot API first) and hands it to the dispatcher.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use teloxide::{net::Download, prelude::*};

use concierge_core::{
    domain::{ChatId as CoreChatId, UserId},
    event::{Attachment, InboundEvent, Sender},
};

use crate::router::AppState;

static FILE_COUNTER: AtomicUsize = AtomicUsize::new(1);

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // Worker-pool bound: caps in-flight events (and outstanding upstream calls).
    let Ok(_permit) = state.workers.acquire().await else {
        return Ok(());
    };

    let Some(user) = msg.from() else {
        return Ok(());
    };

    let sender = Sender {
        id: UserId(user.id.0 as i64),
        display_name: user.full_name(),
        handle: user.username.clone(),
    };
    let chat = CoreChatId(msg.chat.id.0);

    let text = msg.text().or_else(|| msg.caption()).map(|s| s.to_string());
    let contact = msg.contact().map(|c| c.phone_number.clone());

    let attachment = match fetch_attachment(&bot, &state, &msg).await {
        Ok(att) => att,
        Err(e) => {
            let reason = e.to_string().chars().take(100).collect::<String>();
            let _ = bot
                .send_message(msg.chat.id, format!("❌ {reason}"))
                .await;
            return Ok(());
        }
    };

    let event = InboundEvent {
        chat,
        sender,
        text,
        contact,
        attachment,
    };
    state.dispatcher.dispatch(event).await;

    Ok(())
}

async fn fetch_attachment(
    bot: &Bot,
    state: &AppState,
    msg: &Message,
) -> anyhow::Result<Option<Attachment>> {
    if let Some(photos) = msg.photo() {
        let best = photos
            .last()
            .ok_or_else(|| anyhow::anyhow!("Failed to download photo: no sizes"))?;
        check_size(best.file.size as u64, state)?;
        let data = download_file(bot, state, best.file.id.clone()).await?;
        return Ok(Some(Attachment {
            name: None,
            photo: true,
            data,
        }));
    }

    if let Some(doc) = msg.document() {
        check_size(doc.file.size as u64, state)?;
        let data = download_file(bot, state, doc.file.id.clone()).await?;
        return Ok(Some(Attachment {
            name: doc.file_name.clone(),
            photo: false,
            data,
        }));
    }

    Ok(None)
}

fn check_size(size: u64, state: &AppState) -> anyhow::Result<()> {
    if size > state.cfg.max_file_size {
        anyhow::bail!(
            "File too large. Maximum size is {}MB.",
            state.cfg.max_file_size / (1024 * 1024)
        );
    }
    Ok(())
}

async fn download_file(bot: &Bot, state: &AppState, file_id: String) -> anyhow::Result<Vec<u8>> {
    let file = bot
        .get_file(file_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to download file: {e}"))?;

    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let n = FILE_COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = state.cfg.temp_dir.join(format!("upload_{ts}_{n}"));

    let mut dst = tokio::fs::File::create(&path).await?;
    bot.download_file(&file.path, &mut dst)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to download file: {e}"))?;
    drop(dst);

    let data = tokio::fs::read(&path).await?;
    let _ = tokio::fs::remove_file(&path).await;

    Ok(data)
}
