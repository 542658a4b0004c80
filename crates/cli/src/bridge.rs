use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    chatsync_browser::RuneScapeAdapter,
    chatsync_channels::{CommandTable, Credentials},
    chatsync_config::ChatsyncConfig,
    chatsync_discord::DiscordAdapter,
    chatsync_sync::{DumpDirs, Endpoint, SyncCoordinator, SyncSettings},
};

use crate::console;

pub fn sync_settings(config: &ChatsyncConfig) -> SyncSettings {
    let sync = &config.sync;
    SyncSettings {
        idle_poll: Duration::from_millis(sync.idle_poll_ms),
        confirm_timeout: Duration::from_millis(sync.confirm_timeout_ms),
        confirm_poll: Duration::from_millis(sync.confirm_poll_ms),
        backoff_initial: Duration::from_millis(sync.restart_backoff_initial_ms),
        backoff_max: Duration::from_millis(sync.restart_backoff_max_ms),
        error_dir: Some(config.dumps.error_dir.clone()),
    }
}

pub fn dump_dirs(config: &ChatsyncConfig) -> DumpDirs {
    DumpDirs {
        html_dir: config.dumps.html_dir.clone(),
        screenshot_dir: config.dumps.screenshot_dir.clone(),
    }
}

fn endpoints(config: &ChatsyncConfig) -> anyhow::Result<(Endpoint, Endpoint)> {
    let password = config
        .runescape
        .password
        .clone()
        .context("runescape.password is not set")?;
    let token = config
        .discord
        .token
        .clone()
        .context("discord.token is not set")?;

    let runescape = Endpoint {
        adapter: Arc::new(RuneScapeAdapter::new(config.runescape.clone())),
        credentials: Credentials::Account {
            username: config.runescape.username.clone(),
            password,
        },
        command_prefix: config.runescape.command_prefix.clone(),
    };
    let discord = Endpoint {
        adapter: Arc::new(DiscordAdapter::new(config.discord.clone())),
        credentials: Credentials::Token(token),
        command_prefix: config.discord.command_prefix.clone(),
    };
    Ok((runescape, discord))
}

/// Start both sides and serve the operator console until it stops.
pub async fn run(config: ChatsyncConfig) -> anyhow::Result<()> {
    let (runescape, discord) = endpoints(&config)?;
    let coordinator = SyncCoordinator::start(
        runescape,
        discord,
        CommandTable::default(),
        sync_settings(&config),
    );
    console::run(&coordinator, &dump_dirs(&config)).await
}
