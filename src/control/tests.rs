//! Scenario tests for the control plane
//!
//! A `VirtualPanel` stands in for the hardware and the command channel is
//! read directly, without a dispatcher.

use super::*;
use crate::channel::{command_channel, status_channel, CommandReceiver, StatusSender};
use crate::config::{InputConfig, LedConfig};
use crate::dispatcher::DispatcherMessage;
use crate::hardware::{Led, SelectorReading, VirtualPanel};
use crate::input::RotaryLine;
use crate::protocol::StatusEvent;

const DEBOUNCE: Duration = Duration::from_millis(1000);

struct Bench {
    panel: Arc<VirtualPanel>,
    plane: ControlPlane,
    lifecycle: Lifecycle,
    commands: CommandReceiver,
    leds: LedController,
    status_tx: StatusSender,
    status: StatusReceiver,
}

impl Bench {
    fn new() -> Self {
        let panel = Arc::new(VirtualPanel::new());
        panel.set_selector(SelectorReading::new(2, 3));
        let (handle, commands) = command_channel();
        let (status_tx, status) = status_channel();
        let lifecycle = Lifecycle::new(handle.clone());
        let plane = ControlPlane::new(
            &InputConfig::default(),
            Hardware::virtual_panel(panel.clone()),
            handle,
            lifecycle.clone(),
        );
        Self {
            panel,
            plane,
            lifecycle,
            commands,
            leds: LedController::new(&LedConfig::default()),
            status_tx,
            status,
        }
    }

    fn edge(&self, switch: Switch, edge: SwitchEdge) {
        let channel = self.plane.switches().channel_for(switch).unwrap();
        self.plane.handle_event(InputEvent::Switch { channel, edge });
    }

    fn press(&self, switch: Switch) {
        self.panel.hold(switch);
        self.edge(switch, SwitchEdge::Pressed);
    }

    fn release(&self, switch: Switch) {
        self.panel.release(switch);
        self.edge(switch, SwitchEdge::Released);
    }

    fn tap(&self, switch: Switch) {
        self.press(switch);
        self.release(switch);
    }

    fn poll(&mut self) {
        self.plane.poll_once(&mut self.leds, &mut self.status);
    }

    /// Commands enqueued so far
    fn sent(&mut self) -> Vec<Command> {
        let mut sent = Vec::new();
        while let Ok(message) = self.commands.try_recv() {
            if let DispatcherMessage::Command(command) = message {
                sent.push(command);
            }
        }
        sent
    }
}

#[tokio::test(start_paused = true)]
async fn test_bounce_inside_window_produces_one_command() {
    let mut b = Bench::new();
    b.tap(Switch::Numbered(1));
    tokio::time::advance(Duration::from_millis(20)).await;
    b.tap(Switch::Numbered(1));
    tokio::time::advance(Duration::from_millis(900)).await;
    b.tap(Switch::Numbered(1));
    assert_eq!(
        b.sent(),
        vec![Command::Playlist { bank: Bank::A, index: 1 }]
    );

    tokio::time::advance(DEBOUNCE).await;
    b.tap(Switch::Numbered(1));
    assert_eq!(b.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_different_switches_are_debounced_independently() {
    let mut b = Bench::new();
    b.tap(Switch::Numbered(1));
    b.tap(Switch::Numbered(2));
    b.tap(Switch::PlayPause);
    assert_eq!(
        b.sent(),
        vec![
            Command::Playlist { bank: Bank::A, index: 1 },
            Command::Playlist { bank: Bank::A, index: 2 },
            Command::PlayPause,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_room_change_while_mode_held_emits_room() {
    let mut b = Bench::new();
    b.press(Switch::Mode);
    b.panel.set_selector(SelectorReading::new(2, 5));
    b.release(Switch::Mode);
    assert_eq!(b.sent(), vec![Command::Room { index: 5 }]);
}

#[tokio::test(start_paused = true)]
async fn test_mode_contact_bounce_keeps_alt_held() {
    let mut b = Bench::new();
    b.press(Switch::Mode);
    // Bounce: release and re-press edges while the line stays down
    b.edge(Switch::Mode, SwitchEdge::Released);
    tokio::time::advance(Duration::from_millis(5)).await;
    b.edge(Switch::Mode, SwitchEdge::Pressed);

    b.tap(Switch::Numbered(4));
    assert_eq!(b.sent(), vec![Command::Track { index: 4 }]);
    assert!(b.plane.mode_view().alt_held);

    b.release(Switch::Mode);
    assert!(!b.plane.mode_view().alt_held);
    assert!(b.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missed_release_is_caught_by_poll() {
    let mut b = Bench::new();
    b.press(Switch::Mode);
    b.panel.set_selector(SelectorReading::new(1, 1));
    // Line goes high but the release edge never arrives
    b.panel.release(Switch::Mode);
    b.poll();
    assert_eq!(
        b.sent(),
        vec![Command::Net { index: 1 }, Command::Room { index: 1 }]
    );
    assert!(!b.plane.mode_view().alt_held);
}

#[tokio::test(start_paused = true)]
async fn test_mode_back_held_switches_off_once() {
    let mut b = Bench::new();
    b.press(Switch::Mode);
    b.press(Switch::Back);
    assert!(b.plane.switch_off_armed());

    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert_eq!(b.sent(), vec![Command::Shutdown]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(b.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_releasing_back_before_window_cancels_switch_off() {
    let mut b = Bench::new();
    b.press(Switch::Mode);
    b.press(Switch::Back);

    tokio::time::sleep(Duration::from_millis(2900)).await;
    b.release(Switch::Back);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(b.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_intervening_press_cancels_switch_off() {
    let mut b = Bench::new();
    b.press(Switch::Mode);
    b.press(Switch::Back);
    tokio::time::sleep(Duration::from_secs(1)).await;
    b.tap(Switch::Numbered(4));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(b.sent(), vec![Command::Track { index: 4 }]);
}

#[tokio::test(start_paused = true)]
async fn test_rotary_drain_emits_accelerated_volume() {
    let mut b = Bench::new();
    for _ in 0..3 {
        // One detent clockwise
        b.plane.handle_event(InputEvent::Rotary { line: RotaryLine::A, a: false, b: true });
        b.plane.handle_event(InputEvent::Rotary { line: RotaryLine::B, a: false, b: false });
        b.plane.handle_event(InputEvent::Rotary { line: RotaryLine::A, a: true, b: false });
        b.plane.handle_event(InputEvent::Rotary { line: RotaryLine::B, a: true, b: true });
    }
    b.poll();
    assert_eq!(b.sent(), vec![Command::Volume { delta: 9 }]);
    assert!(b.lifecycle.take_activity());

    b.poll();
    assert!(b.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_press_raises_activity() {
    let b = Bench::new();
    assert!(!b.lifecycle.take_activity());
    b.tap(Switch::Bank);
    assert!(b.lifecycle.take_activity());
}

#[tokio::test(start_paused = true)]
async fn test_unmapped_channel_is_ignored() {
    let mut b = Bench::new();
    b.plane.handle_event(InputEvent::Switch {
        channel: 99,
        edge: SwitchEdge::Pressed,
    });
    assert!(b.sent().is_empty());
    assert!(!b.lifecycle.take_activity());
}

#[tokio::test(start_paused = true)]
async fn test_leds_follow_mode_and_status() {
    let mut b = Bench::new();
    b.status_tx.send(StatusEvent::RoomNetworkSync { network: 2, room: 3 });
    b.poll();
    assert_eq!(
        b.panel.lit(),
        vec![Led::Bank(Bank::A), Led::Room(3), Led::Network(2)]
    );

    b.tap(Switch::Bank);
    b.poll();
    assert!(b.panel.led(Led::Bank(Bank::B)));
    assert!(!b.panel.led(Led::Bank(Bank::A)));

    // Mode+Play latches shift: every bank LED blinks
    b.press(Switch::Mode);
    b.tap(Switch::PlayPause);
    b.release(Switch::Mode);
    b.poll();
    let lit_now = Bank::ALL.iter().filter(|bank| b.panel.led(Led::Bank(**bank))).count();
    tokio::time::advance(Duration::from_millis(500)).await;
    b.poll();
    let lit_next = Bank::ALL.iter().filter(|bank| b.panel.led(Led::Bank(**bank))).count();
    assert_eq!(lit_now + lit_next, 4);
}

#[tokio::test(start_paused = true)]
async fn test_run_exits_on_stop() {
    let b = Bench::new();
    let task = tokio::spawn(b.plane.clone().run(b.leds, b.status, Duration::from_millis(100)));

    tokio::time::sleep(Duration::from_millis(350)).await;
    b.lifecycle.request_stop();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("poll loop did not stop")
        .unwrap();
}
