//! Engine that plays nothing and logs every transport call.

use log::info;

use syncplay_core::engine::{EngineError, EngineEventSender, EngineResult, MediaEngine};
use syncplay_core::resolver::MediaResource;
use syncplay_types::EngineState;

pub struct DryRunEngine {
    events: Option<EngineEventSender>,
    state: EngineState,
    volume: f32,
    loaded: Option<MediaResource>,
    position_ms: u32,
    playing: bool,
}

impl DryRunEngine {
    pub fn new() -> Self {
        Self {
            events: None,
            state: EngineState::Idle,
            volume: 1.0,
            loaded: None,
            position_ms: 0,
            playing: false,
        }
    }

    fn set_state(&mut self, state: EngineState) {
        if self.state == state {
            return;
        }
        self.state = state;
        if let Some(events) = &self.events {
            events.state_changed(state);
        }
    }

    fn require_media(&self, op: &str) -> EngineResult<&MediaResource> {
        self.loaded
            .as_ref()
            .ok_or_else(|| EngineError(format!("{}: no media loaded", op)))
    }
}

impl MediaEngine for DryRunEngine {
    fn attach(&mut self, events: EngineEventSender) {
        self.events = Some(events);
    }

    fn load(&mut self, resource: &MediaResource) -> EngineResult {
        info!(target: "playback", "[dry-run] load {}", resource.path().display());
        self.loaded = Some(resource.clone());
        self.position_ms = 0;
        self.playing = false;
        self.set_state(EngineState::Buffering);
        self.set_state(EngineState::Ready);
        Ok(())
    }

    fn seek(&mut self, position_ms: u32) -> EngineResult {
        self.require_media("seek")?;
        info!(target: "playback", "[dry-run] seek to {}ms", position_ms);
        self.position_ms = position_ms;
        Ok(())
    }

    fn play(&mut self) -> EngineResult {
        let name = self.require_media("play")?.name().to_string();
        info!(target: "playback", "[dry-run] play {} from {}ms", name, self.position_ms);
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> EngineResult {
        self.require_media("pause")?;
        info!(target: "playback", "[dry-run] pause");
        self.playing = false;
        Ok(())
    }

    fn stop(&mut self) -> EngineResult {
        if self.playing {
            info!(target: "playback", "[dry-run] stop");
        }
        self.playing = false;
        self.position_ms = 0;
        self.set_state(EngineState::Idle);
        Ok(())
    }

    fn clear_media(&mut self) -> EngineResult {
        self.loaded = None;
        self.set_state(EngineState::Idle);
        Ok(())
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) -> EngineResult {
        self.volume = volume.clamp(0.0, 1.0);
        info!(target: "playback", "[dry-run] volume {:.2}", self.volume);
        Ok(())
    }
}
