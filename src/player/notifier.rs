use async_trait::async_trait;
use tracing::info;

use crate::{
    common::types::{AnyResult, ChannelId},
    protocol::Notice,
};

/// Delivers status notices to a session's text channel.
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn notify(&self, channel: Option<ChannelId>, notice: &Notice) -> AnyResult<()>;
}

/// Writes notices to the log.
pub struct LogNotifier;

#[async_trait]
impl StatusNotifier for LogNotifier {
    async fn notify(&self, channel: Option<ChannelId>, notice: &Notice) -> AnyResult<()> {
        match channel {
            Some(channel) => info!("[{}] #{}: {}", notice.guild_id(), channel, notice.text()),
            None => info!("[{}] {}", notice.guild_id(), notice.text()),
        }
        Ok(())
    }
}
