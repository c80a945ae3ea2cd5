use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    common::types::GuildId,
    configs::PlayerConfig,
    player::{GuildPlayer, PlayerError, PlayerServices},
    protocol::PlayerSnapshot,
};

/// Every live session, keyed by guild.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<GuildPlayer>>,
    config: PlayerConfig,
    services: PlayerServices,
    /// Serializes creation so the capacity check and insert are atomic.
    create_lock: parking_lot::Mutex<()>,
}

impl SessionRegistry {
    pub fn new(config: PlayerConfig, services: PlayerServices) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            services,
            create_lock: parking_lot::Mutex::new(()),
        }
    }

    pub fn get(&self, guild_id: &GuildId) -> Option<Arc<GuildPlayer>> {
        self.sessions.get(guild_id).map(|s| s.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn snapshots(&self) -> Vec<PlayerSnapshot> {
        let mut snapshots: Vec<PlayerSnapshot> =
            self.sessions.iter().map(|e| e.value().snapshot()).collect();
        snapshots.sort_by(|a, b| a.guild_id.0.cmp(&b.guild_id.0));
        snapshots
    }

    /// Returns the guild's session, creating it if needed.
    ///
    /// At capacity the least recently active session that is not playing is
    /// evicted; if every session is playing the request is refused.
    pub async fn get_or_create(&self, guild_id: &GuildId) -> Result<Arc<GuildPlayer>, PlayerError> {
        if let Some(existing) = self.get(guild_id) {
            return Ok(existing);
        }

        let (player, evicted) = {
            let _create = self.create_lock.lock();
            if let Some(existing) = self.get(guild_id) {
                return Ok(existing);
            }

            let evicted = if self.sessions.len() >= self.config.max_sessions {
                let victim = self.eviction_candidate().ok_or_else(|| {
                    warn!(
                        "Session limit of {} reached, refusing {}",
                        self.config.max_sessions, guild_id
                    );
                    PlayerError::SessionLimit
                })?;
                self.sessions.remove(&victim).map(|(_, s)| s)
            } else {
                None
            };

            let player = GuildPlayer::new(
                guild_id.clone(),
                self.config.clone(),
                self.services.clone(),
            );
            self.sessions.insert(guild_id.clone(), player.clone());
            (player, evicted)
        };

        if let Some(evicted) = evicted {
            info!(
                "Evicted idle session {} to make room for {}",
                evicted.guild_id, guild_id
            );
            evicted.destroy().await;
        }
        debug!("Created session {} ({} live)", guild_id, self.sessions.len());
        Ok(player)
    }

    /// Destroys and forgets the guild's session.
    pub async fn remove(&self, guild_id: &GuildId) -> bool {
        match self.sessions.remove(guild_id) {
            Some((_, player)) => {
                player.destroy().await;
                info!("Removed session {}", guild_id);
                true
            }
            None => false,
        }
    }

    /// Removes sessions idle past the inactivity timeout that are neither
    /// playing nor connected. Returns how many went away.
    pub async fn sweep(&self) -> usize {
        let timeout = self.config.inactive_timeout();
        let expired = |p: &Arc<GuildPlayer>| {
            !p.is_playing() && !p.is_connected() && p.idle_for() > timeout
        };

        let candidates: Vec<GuildId> = self
            .sessions
            .iter()
            .filter(|entry| expired(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for guild_id in candidates {
            if let Some((_, player)) = self.sessions.remove_if(&guild_id, |_, p| expired(p)) {
                player.destroy().await;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Swept {} inactive session(s), {} left", removed, self.sessions.len());
        }
        removed
    }

    /// Runs [`sweep`](Self::sweep) on the configured interval.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        let period = self.config.sweep_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.sweep().await;
            }
        })
    }

    /// Destroys every session concurrently.
    pub async fn shutdown(&self) {
        let guilds: Vec<GuildId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        info!("Shutting down {} session(s)", guilds.len());
        futures::future::join_all(guilds.iter().map(|guild_id| self.remove(guild_id))).await;
    }

    fn eviction_candidate(&self) -> Option<GuildId> {
        self.sessions
            .iter()
            .filter(|entry| !entry.value().is_playing())
            .max_by_key(|entry| entry.value().idle_for())
            .map(|entry| entry.key().clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::{
        audio::{AudioProducer, ProducerError, ProducerFactory, StreamLocator, producer::testing::ConstProducer},
        common::types::ChannelId,
        configs::VoiceConfig,
        player::LogNotifier,
        protocol::{Track, TrackInfo},
        sources::{ResolveError, TrackResolver},
        voice::LocalConnector,
    };

    struct PathResolver;

    #[async_trait]
    impl TrackResolver for PathResolver {
        fn name(&self) -> &str {
            "path"
        }

        async fn resolve(&self, track: &Track) -> Result<StreamLocator, ResolveError> {
            Ok(StreamLocator::File(track.info.uri.clone().into()))
        }
    }

    struct EndlessFactory;

    #[async_trait]
    impl ProducerFactory for EndlessFactory {
        async fn open_music(
            &self,
            _label: &str,
            _locator: &StreamLocator,
            _start: Duration,
        ) -> Result<Box<dyn AudioProducer>, ProducerError> {
            Ok(Box::new(ConstProducer::new(1, usize::MAX).0))
        }

        async fn open_speech(
            &self,
            _label: &str,
            _clip: Bytes,
        ) -> Result<Box<dyn AudioProducer>, ProducerError> {
            Ok(Box::new(ConstProducer::new(1, 1).0))
        }
    }

    fn registry(max_sessions: usize) -> Arc<SessionRegistry> {
        let config = PlayerConfig {
            max_sessions,
            inactive_timeout_minutes: 1,
            ..PlayerConfig::default()
        };
        let services = PlayerServices {
            resolver: Arc::new(PathResolver),
            producers: Arc::new(EndlessFactory),
            connector: Arc::new(LocalConnector::new(VoiceConfig::default())),
            notifier: Arc::new(LogNotifier),
        };
        Arc::new(SessionRegistry::new(config, services))
    }

    async fn start_playing(player: &Arc<GuildPlayer>) {
        player.join(ChannelId(1), None).await.expect("joins");
        player
            .enqueue(Track::new(TrackInfo {
                title: "song".into(),
                duration: 600,
                uri: "song.mp3".into(),
                thumbnail: None,
                requester: None,
            }))
            .await
            .expect("enqueues");
        assert!(player.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_create_reuses_session() {
        let registry = registry(4);
        let a = registry.get_or_create(&"a".into()).await.expect("creates");
        let again = registry.get_or_create(&"a".into()).await.expect("reuses");
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&"b".into()).is_none());
        assert_eq!(registry.snapshots()[0].guild_id, GuildId::from("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_least_recently_active_idle_session() {
        let registry = registry(2);
        registry.get_or_create(&"old".into()).await.expect("creates");
        tokio::time::sleep(Duration::from_secs(5)).await;
        registry.get_or_create(&"new".into()).await.expect("creates");
        tokio::time::sleep(Duration::from_secs(1)).await;

        registry.get_or_create(&"third".into()).await.expect("evicts");
        assert_eq!(registry.len(), 2);
        assert!(registry.get(&"old".into()).is_none());
        assert!(registry.get(&"new".into()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_refuses_when_every_session_plays() {
        let registry = registry(1);
        let busy = registry.get_or_create(&"busy".into()).await.expect("creates");
        start_playing(&busy).await;

        assert_eq!(
            registry.get_or_create(&"other".into()).await.map(|_| ()),
            Err(PlayerError::SessionLimit)
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_connected_and_recent_sessions() {
        let registry = registry(8);
        registry.get_or_create(&"stale".into()).await.expect("creates");
        let connected = registry.get_or_create(&"connected".into()).await.expect("creates");
        connected.join(ChannelId(3), None).await.expect("joins");

        tokio::time::sleep(Duration::from_secs(61)).await;
        registry.get_or_create(&"fresh".into()).await.expect("creates");

        assert_eq!(registry.sweep().await, 1);
        assert!(registry.get(&"stale".into()).is_none());
        assert!(registry.get(&"connected".into()).is_some());
        assert!(registry.get(&"fresh".into()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_destroys_every_session() {
        let registry = registry(8);
        let a = registry.get_or_create(&"a".into()).await.expect("creates");
        let b = registry.get_or_create(&"b".into()).await.expect("creates");
        a.join(ChannelId(1), None).await.expect("joins");
        b.join(ChannelId(2), None).await.expect("joins");

        registry.shutdown().await;
        assert!(registry.is_empty());
        assert!(!a.is_connected() && !b.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_destroys_session() {
        let registry = registry(8);
        let player = registry.get_or_create(&"g".into()).await.expect("creates");
        player.join(ChannelId(1), None).await.expect("joins");

        assert!(registry.remove(&"g".into()).await);
        assert!(!player.is_connected());
        assert!(!registry.remove(&"g".into()).await);
    }
}
