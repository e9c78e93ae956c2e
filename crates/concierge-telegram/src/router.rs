use std::sync::Arc;

use teloxide::{dispatching::Dispatcher as UpdateDispatcher, dptree, prelude::*};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use concierge_core::{
    config::Config,
    dispatcher::Dispatcher,
    ports::{CompletionPort, MessagingPort, SearchPort, StoragePort},
};

use crate::handlers;
use crate::TelegramMessenger;

pub struct AppState {
    pub cfg: Arc<Config>,
    pub dispatcher: Dispatcher,
    pub workers: Semaphore,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    completion: Arc<dyn CompletionPort>,
    search: Arc<dyn SearchPort>,
    store: Arc<dyn StoragePort>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    if let Ok(me) = bot.get_me().await {
        println!("concierge started: @{}", me.username());
    }
    let mut commands: Vec<_> = cfg.commands.iter().cloned().collect();
    commands.sort();
    println!("Enabled commands: {}", commands.join(", "));

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let shutdown = CancellationToken::new();

    let state = Arc::new(AppState {
        dispatcher: Dispatcher::new(
            cfg.clone(),
            messenger,
            completion,
            search,
            store,
            shutdown.clone(),
        ),
        workers: Semaphore::new(cfg.max_concurrent_events),
        cfg,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut updates = UpdateDispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build();

    // Ctrl-C: cancel in-flight handlers, then stop the polling loop.
    let stop = updates.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
            if let Ok(done) = stop.shutdown() {
                done.await;
            }
        }
    });

    updates.dispatch().await;

    Ok(())
}
