//! Tests for the dispatcher actor

use super::*;
use crate::backends::{BackendCall, BackendKind, ConsoleBackend};
use crate::channel::{command_channel, status_channel, StatusReceiver};
use crate::protocol::Bank;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct RecordingSelector {
    selected: Mutex<Vec<u32>>,
    failing: AtomicBool,
}

#[async_trait]
impl NetworkSelector for RecordingSelector {
    async fn select_network(&self, id: u32) -> Result<()> {
        self.selected.lock().push(id);
        if self.failing.load(Ordering::SeqCst) {
            bail!("wpa_cli not available");
        }
        Ok(())
    }
}

struct Fixture {
    handle: DispatcherHandle,
    lifecycle: Lifecycle,
    status: StatusReceiver,
    sonos: Arc<ConsoleBackend>,
    mpd: Arc<ConsoleBackend>,
    selector: Arc<RecordingSelector>,
    task: JoinHandle<DispatcherState>,
}

impl Fixture {
    fn start() -> Self {
        let config = AppConfig::default();
        let selection = config.player.default_selection(&config.site);
        Self::start_with(&config, selection)
    }

    fn start_with(config: &AppConfig, selection: PlayerSelection) -> Self {
        let (handle, rx) = command_channel();
        let (status_tx, status) = status_channel();
        let lifecycle = Lifecycle::new(handle.clone());
        let sonos = Arc::new(ConsoleBackend::new(BackendKind::Sonos));
        let mpd = Arc::new(ConsoleBackend::new(BackendKind::Mpd));
        let selector = Arc::new(RecordingSelector::default());
        let backends = BackendRegistry::new()
            .with(BackendKind::Sonos, sonos.clone())
            .with(BackendKind::Mpd, mpd.clone());

        let task = Dispatcher::new(
            config,
            selection,
            rx,
            status_tx,
            backends,
            selector.clone(),
            lifecycle.clone(),
        )
        .spawn();

        Self {
            handle,
            lifecycle,
            status,
            sonos,
            mpd,
            selector,
            task,
        }
    }

    fn send(&self, line: &str) {
        assert!(self.handle.send_line(line), "rejected: {}", line);
    }

    /// Wait until every command sent so far has been processed
    async fn settle(&self) {
        self.handle.is_playing().await;
    }

    async fn stop(self) -> DispatcherState {
        self.lifecycle.request_stop();
        self.task.await.unwrap()
    }
}

/// Backend calls, ignoring the playback queries used as barriers
fn player_calls(backend: &ConsoleBackend) -> Vec<BackendCall> {
    backend
        .calls()
        .into_iter()
        .filter(|c| !matches!(c, BackendCall::IsCurrentlyPlaying { .. }))
        .collect()
}

fn start_playlist(playlist: &str, room: &str) -> BackendCall {
    BackendCall::StartPlaylist {
        playlist: playlist.into(),
        room: room.into(),
    }
}

#[tokio::test]
async fn test_initial_sync_is_sent() {
    let mut fx = Fixture::start();
    fx.settle().await;
    assert_eq!(
        fx.status.drain(),
        vec![StatusEvent::RoomNetworkSync { network: 2, room: 3 }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_playlist_guard_drops_quick_restart() {
    let fx = Fixture::start();
    fx.send("PLAYLIST A 01");
    fx.send("PLAYLIST A 01");
    fx.settle().await;
    assert_eq!(player_calls(&fx.sonos), vec![start_playlist("zCharliebert_A01", "Office")]);

    tokio::time::advance(Duration::from_secs(10)).await;
    fx.send("PLAYLIST B 12");
    fx.settle().await;
    assert_eq!(fx.sonos.playlist_starts(), 2);
    assert_eq!(
        player_calls(&fx.sonos).last(),
        Some(&start_playlist("zCharliebert_B12", "Office"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_pause_cancels_guard() {
    let fx = Fixture::start();
    fx.send("PLAYLIST A 01");
    fx.send("PLAY/PAUSE");
    fx.send("PLAYLIST A 02");
    fx.send("PLAYLIST A 03");
    fx.settle().await;
    // The cancelled start lets exactly one more through
    assert_eq!(fx.sonos.playlist_starts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_resume_does_not_cancel_guard() {
    let fx = Fixture::start();
    fx.send("PLAYLIST A 01");
    fx.settle().await;
    // Playback stopped on its own; the toggle resumes it
    fx.sonos.set_playing(false);
    fx.send("PLAY/PAUSE");
    fx.send("PLAYLIST A 02");
    fx.settle().await;
    assert_eq!(fx.sonos.playlist_starts(), 1);
    assert!(fx.sonos.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_alt_playlist_shares_the_guard() {
    let fx = Fixture::start();
    fx.send("ALTPLAYLIST C 04");
    fx.send("PLAYLIST C 04");
    fx.settle().await;
    assert_eq!(
        player_calls(&fx.sonos),
        vec![BackendCall::StartPlaylistAlt {
            playlist: "zCharliebert_C04".into(),
            room: "Office".into(),
        }]
    );
}

#[tokio::test]
async fn test_backend_failure_does_not_stop_the_loop() {
    let fx = Fixture::start();
    fx.sonos.set_failing(true);
    fx.send("FORWARD");
    fx.settle().await;
    fx.sonos.set_failing(false);
    fx.send("BACK");
    fx.send("TRACK 4");
    fx.settle().await;

    assert_eq!(
        player_calls(&fx.sonos),
        vec![
            BackendCall::SkipToNext { room: "Office".into() },
            BackendCall::SkipToPrevious { room: "Office".into() },
            BackendCall::PlayTrack { track: 4, room: "Office".into() },
        ]
    );
}

#[tokio::test]
async fn test_volume_deltas_are_applied_in_order() {
    let fx = Fixture::start();
    fx.send("VOLUME +4");
    fx.send("VOLUME -1");
    fx.send("VOLUME +9");
    fx.settle().await;

    let deltas: Vec<i32> = player_calls(&fx.sonos)
        .into_iter()
        .filter_map(|c| match c {
            BackendCall::AdjustVolume { delta, .. } => Some(delta),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, vec![4, -1, 9]);
}

#[tokio::test]
async fn test_malformed_line_reaches_no_backend() {
    let fx = Fixture::start();
    assert!(!fx.handle.send_line("FOO BAR"));
    fx.settle().await;
    assert!(player_calls(&fx.sonos).is_empty());
    assert!(player_calls(&fx.mpd).is_empty());
}

#[tokio::test]
async fn test_room_change() {
    let mut fx = Fixture::start();
    fx.send("ROOM 5");
    fx.send("PLAY/PAUSE");
    fx.settle().await;

    assert_eq!(
        fx.status.drain().last(),
        Some(&StatusEvent::RoomNetworkSync { network: 2, room: 5 })
    );
    assert_eq!(
        player_calls(&fx.sonos),
        vec![BackendCall::TogglePlayPause { room: "Living Room".into() }]
    );
}

#[tokio::test]
async fn test_unknown_room_is_ignored() {
    let mut fx = Fixture::start();
    fx.settle().await;
    fx.status.drain();

    fx.send("ROOM 9");
    fx.settle().await;
    assert!(fx.status.drain().is_empty());

    let state = fx.stop().await;
    assert_eq!(state.selection.room, 3);
}

#[tokio::test(start_paused = true)]
async fn test_network_change_joins_network_and_falls_back_to_first_room() {
    let mut fx = Fixture::start();
    let started = Instant::now();
    fx.send("NET 1");
    fx.settle().await;

    assert_eq!(*fx.selector.selected.lock(), vec![1]);
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(
        fx.status.drain().last(),
        Some(&StatusEvent::RoomNetworkSync { network: 1, room: 1 })
    );

    fx.send("FORWARD");
    fx.settle().await;
    assert_eq!(
        player_calls(&fx.sonos),
        vec![BackendCall::SkipToNext { room: "Wohnzimmer".into() }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_network_change_switches_backend() {
    let mut fx = Fixture::start();
    fx.send("NET 3");
    fx.send("PLAYLIST D 02");
    fx.settle().await;

    // The local player needs no wireless switch
    assert!(fx.selector.selected.lock().is_empty());
    assert_eq!(
        fx.status.drain().last(),
        Some(&StatusEvent::RoomNetworkSync { network: 3, room: 0 })
    );
    assert_eq!(
        player_calls(&fx.mpd),
        vec![start_playlist("zCharliebert_D02", "Charliebert")]
    );
    assert!(player_calls(&fx.sonos).is_empty());

    let state = fx.stop().await;
    assert_eq!(state.selection.backend, BackendKind::Mpd);
}

#[tokio::test(start_paused = true)]
async fn test_same_network_does_not_rejoin() {
    let fx = Fixture::start();
    fx.send("NET 2");
    fx.settle().await;
    assert!(fx.selector.selected.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_network_join_changes_nothing() {
    let fx = Fixture::start();
    fx.selector.failing.store(true, Ordering::SeqCst);
    fx.send("NET 1");
    fx.settle().await;

    let state = fx.stop().await;
    assert_eq!(state.selection.network, 2);
    assert_eq!(state.selection.room, 3);
}

#[tokio::test(start_paused = true)]
async fn test_indicator_self_test() {
    let mut fx = Fixture::start();
    fx.settle().await;
    fx.status.drain();

    fx.send("COMMAND 1");
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fx.status.drain(), vec![StatusEvent::ProgressStart]);

    fx.settle().await;
    assert_eq!(fx.status.drain(), vec![StatusEvent::ProgressStop]);
}

#[tokio::test]
async fn test_unknown_generic_command_is_ignored() {
    let mut fx = Fixture::start();
    fx.settle().await;
    fx.status.drain();
    fx.send("COMMAND 7");
    fx.settle().await;
    assert!(fx.status.drain().is_empty());
    assert!(!fx.lifecycle.is_stopped());
}

#[tokio::test]
async fn test_shutdown_command_stops_and_requests_power_off() {
    let fx = Fixture::start();
    fx.send("SHUTDOWN");
    let state = tokio::time::timeout(Duration::from_secs(1), fx.task)
        .await
        .expect("dispatcher did not stop")
        .unwrap();

    assert!(fx.lifecycle.is_stopped());
    assert!(fx.lifecycle.power_off_requested());
    assert_eq!(state.selection.network, 2);
}

#[tokio::test]
async fn test_is_playing_follows_backend() {
    let fx = Fixture::start();
    assert!(!fx.handle.is_playing().await);
    fx.send("PLAYLIST A 05");
    assert!(fx.handle.is_playing().await);

    fx.sonos.set_failing(true);
    assert!(!fx.handle.is_playing().await);
}

#[tokio::test]
async fn test_stop_is_idempotent_and_returns_state() {
    let mut config = AppConfig::default();
    config.player.playlist_prefix = "kids".into();
    let selection = config.player.default_selection(&config.site);
    let fx = Fixture::start_with(&config, selection);

    fx.send("ROOM 1");
    fx.lifecycle.request_stop();
    fx.lifecycle.request_stop();
    let state = fx.task.await.unwrap();

    assert_eq!(state.selection.room, 1);
    assert_eq!(state.selection.playlist_name(Bank::A, 1), "kids_A01");
    // Queries after the stop get a safe answer
    assert!(!fx.handle.is_playing().await);
}
