//! Control loop.
//!
//! One frame is strictly sequential: sample input (publisher only), run the
//! sync tick, render. Frames are paced with `sleep_until` on a fixed grid so
//! a slow frame does not shift later ones.

use std::future::Future;
use std::time::Duration;

use sprite_shared::{
    render::RenderBackend,
    sync::{Role, SyncChannel, TickOutcome},
};
use tokio::time::Instant;
use tracing::info;

use crate::app::AppState;
use crate::input::ScriptedInput;

/// Frames between periodic status lines.
const STATUS_EVERY: u64 = 300;

/// Running totals of tick outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub sent: u64,
    pub no_peers: u64,
    pub skipped: u64,
    pub applied: u64,
    pub discarded: u64,
    pub idle: u64,
    pub malformed: u64,
    pub disconnected: u64,
}

impl SyncStats {
    fn record(&mut self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Sent { .. } => self.sent += 1,
            TickOutcome::NoPeers => self.no_peers += 1,
            TickOutcome::Skipped => self.skipped += 1,
            TickOutcome::Applied { discarded } => {
                self.applied += 1;
                self.discarded += discarded as u64;
            }
            TickOutcome::Idle => self.idle += 1,
            TickOutcome::Malformed => self.malformed += 1,
            TickOutcome::Disconnected => self.disconnected += 1,
        }
    }
}

/// The demo: state, sync channel, input, renderer.
pub struct SpriteDemo {
    pub state: AppState,
    channel: SyncChannel,
    input: Option<ScriptedInput>,
    renderer: Box<dyn RenderBackend>,
    frame: u64,
    stats: SyncStats,
}

impl SpriteDemo {
    /// Publishers get a [`ScriptedInput`]; subscribers only follow.
    pub fn new(state: AppState, channel: SyncChannel, renderer: Box<dyn RenderBackend>) -> Self {
        let input = match channel.role() {
            Role::Publisher => Some(ScriptedInput::default()),
            Role::Subscriber => None,
        };
        Self {
            state,
            channel,
            input,
            renderer,
            frame: 0,
            stats: SyncStats::default(),
        }
    }

    /// Replaces the input source. `None` leaves the local sprites still.
    pub fn with_input(mut self, input: Option<ScriptedInput>) -> Self {
        self.input = input;
        self
    }

    pub fn role(&self) -> Role {
        self.channel.role()
    }

    pub fn channel(&self) -> &SyncChannel {
        &self.channel
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Runs one frame: input, sync, render.
    pub fn step(&mut self) -> TickOutcome {
        if let Some(input) = self.input.as_mut() {
            let sampled = input.sample(&self.state);
            self.state.apply_input(sampled);
        }

        let mut snapshot = self.state.snapshot();
        let outcome = self.channel.tick(&mut snapshot);
        if let TickOutcome::Applied { .. } = outcome {
            self.state.apply_snapshot(snapshot);
        }
        self.stats.record(outcome);

        self.state.render(self.renderer.as_mut(), self.frame);
        self.frame += 1;

        if self.frame % STATUS_EVERY == 0 {
            info!(
                role = %self.role(),
                frame = self.frame,
                texture = ?self.state.texture.position,
                message = ?self.state.message.position,
                stats = ?self.stats,
                "Status"
            );
        }
        outcome
    }

    /// Steps every `frame_delay` until `max_frames` frames have run (if set)
    /// or `shutdown` resolves.
    pub async fn run(
        &mut self,
        frame_delay: Duration,
        max_frames: Option<u64>,
        shutdown: impl Future<Output = ()>,
    ) {
        tokio::pin!(shutdown);
        let mut next_frame = Instant::now();
        let mut frames = 0u64;

        loop {
            if max_frames.is_some_and(|max| frames >= max) {
                info!(frames, "Frame limit reached");
                break;
            }
            self.step();
            frames += 1;

            next_frame += frame_delay;
            tokio::select! {
                _ = tokio::time::sleep_until(next_frame) => {}
                _ = &mut shutdown => {
                    info!(frames, "Shutdown requested");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::default_entities;
    use sprite_shared::{
        math::IVec2,
        net::PubSocket,
        render::NullRenderer,
        wire::WireFormat,
    };

    fn state() -> AppState {
        AppState::from_entities(default_entities())
    }

    #[test]
    fn subscriber_follows_publisher_each_frame() {
        let socket = PubSocket::in_process();
        let sub = socket.subscribe_local("");
        let mut publisher = SpriteDemo::new(
            state(),
            SyncChannel::publisher(socket, WireFormat::V1, ""),
            Box::new(NullRenderer),
        );
        let mut follower = SpriteDemo::new(
            state(),
            SyncChannel::subscriber(sub, WireFormat::V1),
            Box::new(NullRenderer),
        );
        follower.state.texture.position = IVec2::new(0, 0);

        for _ in 0..5 {
            assert_eq!(publisher.step(), TickOutcome::Sent { peers: 1 });
            assert_eq!(follower.step(), TickOutcome::Applied { discarded: 0 });
            assert_eq!(follower.state.texture.position, publisher.state.texture.position);
        }
        assert_ne!(publisher.state.texture.position, IVec2::new(100, 100));
        assert_eq!(publisher.stats().sent, 5);
        assert_eq!(follower.stats().applied, 5);
    }

    #[test]
    fn subscriber_keeps_sizes_and_decorations() {
        let socket = PubSocket::in_process();
        let sub = socket.subscribe_local("");
        let mut follower = SpriteDemo::new(
            state(),
            SyncChannel::subscriber(sub, WireFormat::V1),
            Box::new(NullRenderer),
        );
        socket.send("010.000 020.000 030.000 040.000".into());
        follower.step();
        assert_eq!(follower.state.texture.size, state().texture.size);
        assert_eq!(follower.state.message.position, IVec2::new(30, 40));
        assert_eq!(follower.state.decorations, state().decorations);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_at_frame_limit() {
        let socket = PubSocket::in_process();
        let mut demo = SpriteDemo::new(
            state(),
            SyncChannel::publisher(socket, WireFormat::V1, ""),
            Box::new(NullRenderer),
        );
        demo.run(Duration::from_millis(16), Some(10), std::future::pending())
            .await;
        assert_eq!(demo.frame(), 10);
        assert_eq!(demo.stats().no_peers, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let socket = PubSocket::in_process();
        let mut demo = SpriteDemo::new(
            state(),
            SyncChannel::publisher(socket, WireFormat::V1, ""),
            Box::new(NullRenderer),
        )
        .with_input(None);
        demo.run(
            Duration::from_millis(16),
            None,
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await;
        assert!(demo.frame() >= 6 && demo.frame() <= 8, "frame = {}", demo.frame());
        assert_eq!(demo.state.texture.position, IVec2::new(100, 100));
    }
}
