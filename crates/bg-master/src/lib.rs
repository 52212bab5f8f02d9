//! Headless controller for beatgrid.
//!
//! Owns a project, the playback transport and the audio session, and
//! exposes the editing, playback and export operations that front ends
//! share.

mod error;
mod export;
mod render;
mod session;
mod tracker;

use std::path::Path;

use bg_engine::{PatternPlayer, SongPlayer};
use bg_ir::Project;

pub use bg_engine::{PlayerContext, SongEvent};
pub use bg_formats::{BitDepth, ChannelLayout, FormatError, SampleRate};
pub use error::{ControllerError, ExportError};
pub use export::{
    export_job, export_loop, export_pattern, export_song, ExportSettings, ExportSummary,
};
pub use render::{song_pattern, RenderJob, RenderTrack};
pub use session::{PlaybackSettings, Session};
pub use tracker::{BufferKey, ReleaseObserver, RenderArena};

/// What is currently driving the output.
enum Transport {
    Idle,
    Pattern(PatternPlayer),
    Song(SongPlayer),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Pattern,
    Song,
}

/// Headless beatgrid controller: owns a project and manages playback.
pub struct Controller {
    project: Project,
    transport: Transport,
    session: Option<Session>,
    settings: PlaybackSettings,
}

impl Controller {
    pub fn new() -> Self {
        Self::with_project(Project::default())
    }

    pub fn with_project(project: Project) -> Self {
        Self {
            project,
            transport: Transport::Idle,
            session: None,
            settings: PlaybackSettings::default(),
        }
    }

    /// Use `session` for playback instead of opening the default device.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = settings;
        self
    }

    // --- Project ---

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Direct access for edits the controller has no operation for, such
    /// as the loop grid channels. Structural edits made while a player
    /// runs are picked up on the next play.
    pub fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }

    pub fn load_project(&mut self, path: &Path) -> Result<(), ControllerError> {
        let project = bg_formats::load_project(path)?;
        self.stop();
        log::info!(target: "controller", "loaded {} from {}", project.name(), path.display());
        self.project = project;
        Ok(())
    }

    pub fn save_project(&self, path: &Path) -> Result<(), ControllerError> {
        bg_formats::save_project(path, &self.project)?;
        log::info!(target: "controller", "saved {}", path.display());
        Ok(())
    }

    pub fn set_bpm(&mut self, bpm: u32) -> Result<(), ControllerError> {
        Ok(self.project.set_bpm(bpm)?)
    }

    // --- Patterns ---

    /// Add a pattern and select it.
    pub fn add_pattern(&mut self) -> Result<usize, ControllerError> {
        Ok(self.project.add_pattern()?)
    }

    /// Delete the selected pattern. Stops pattern playback first.
    pub fn delete_pattern(&mut self) -> Result<(), ControllerError> {
        let index = self
            .project
            .selected_pattern_index()
            .ok_or(ControllerError::NoPattern)?;
        if matches!(self.transport, Transport::Pattern(_)) {
            self.stop();
        }
        let removed = self.project.delete_pattern(index)?;
        log::debug!(target: "controller", "deleted pattern {}", removed.name());
        Ok(())
    }

    pub fn select_pattern(&mut self, index: Option<usize>) -> Result<(), ControllerError> {
        Ok(self.project.select_pattern(index)?)
    }

    pub fn rename_pattern(&mut self, name: &str) -> Result<(), ControllerError> {
        self.selected_mut()?.set_name(name);
        Ok(())
    }

    pub fn set_number_of_beats(&mut self, beats: usize) -> Result<(), ControllerError> {
        Ok(self.selected_mut()?.set_number_of_beats(beats)?)
    }

    /// Add an instrument playing `path` to the selected pattern. The file
    /// must be a source we can decode.
    pub fn add_instrument(&mut self, path: &Path) -> Result<usize, ControllerError> {
        if self.project.selected_pattern().is_none() {
            return Err(ControllerError::NoPattern);
        }
        if !bg_formats::validate_source(path) {
            return Err(ControllerError::UnrecognizedSource(path.display().to_string()));
        }
        let source = path.to_string_lossy();
        let index = self.selected_mut()?.add_instrument(&source);
        log::debug!(target: "controller", "instrument {} <- {}", index, source);
        Ok(index)
    }

    pub fn remove_instrument(&mut self, index: usize) -> Result<(), ControllerError> {
        self.selected_mut()?.remove_instrument(index)?;
        Ok(())
    }

    /// Flip one beat of the selected pattern. Returns the new state.
    pub fn toggle_beat(&mut self, instrument: usize, beat: usize) -> Result<bool, ControllerError> {
        let pattern = self.project.selected_pattern().ok_or(ControllerError::NoPattern)?;
        let beat = pattern
            .instrument(instrument)
            .and_then(|i| i.beat(beat))
            .ok_or(bg_ir::ModelError::IndexOutOfRange {
                what: "beat",
                index: beat,
            })?;
        Ok(beat.toggle())
    }

    /// Flip the selected pattern's song slot. Returns the new state.
    pub fn toggle_slot(&mut self, slot: usize) -> Result<bool, ControllerError> {
        let pattern = self.selected_mut()?;
        let enabled = !pattern.is_item_enabled(slot);
        pattern.set_item_enabled(slot, enabled)?;
        Ok(enabled)
    }

    fn selected_mut(&mut self) -> Result<&mut bg_ir::Pattern, ControllerError> {
        self.project
            .selected_pattern_mut()
            .ok_or(ControllerError::NoPattern)
    }

    // --- Real-time playback ---

    pub fn transport_state(&self) -> TransportState {
        match self.transport {
            Transport::Idle => TransportState::Idle,
            Transport::Pattern(_) => TransportState::Pattern,
            Transport::Song(_) => TransportState::Song,
        }
    }

    pub fn is_playing(&self) -> bool {
        match &self.transport {
            Transport::Idle => false,
            Transport::Pattern(player) => player.is_playing(),
            Transport::Song(player) => player.is_playing(),
        }
    }

    /// Start looping the selected pattern, or stop it if it is playing.
    /// Returns whether the pattern is now playing.
    pub fn play_or_stop_pattern(&mut self) -> Result<bool, ControllerError> {
        match (self.transport_state(), self.is_playing()) {
            (TransportState::Pattern, true) => {
                self.stop();
                return Ok(false);
            }
            (TransportState::Song, true) => return Err(ControllerError::PlayerActive("song")),
            _ => self.stop(),
        }
        if self.project.selected_pattern().is_none() {
            return Err(ControllerError::NoPattern);
        }

        let ctx = self.context()?;
        let bpm = self.project.bpm();
        let pattern = self
            .project
            .selected_pattern()
            .ok_or(ControllerError::NoPattern)?;
        let player = PatternPlayer::for_pattern(pattern, bpm, true, &ctx)?;
        log::info!(target: "controller", "playing pattern {} at {} BPM", pattern.name(), bpm);
        player.play(None)?;
        self.transport = Transport::Pattern(player);
        Ok(true)
    }

    /// Start the song from its first slot, or stop it if it is playing.
    /// Returns whether the song is now playing; a song with nothing
    /// arranged does not start.
    pub fn play_or_stop_song(&mut self) -> Result<bool, ControllerError> {
        match (self.transport_state(), self.is_playing()) {
            (TransportState::Song, true) => {
                self.stop();
                return Ok(false);
            }
            (TransportState::Pattern, true) => return Err(ControllerError::PlayerActive("pattern")),
            _ => self.stop(),
        }

        let bpm = self.project.bpm();
        let ctx = self.context()?;
        let player = SongPlayer::new(self.project.song(), bpm, &ctx)?;
        player.play(Some(std::sync::Arc::new(|event| {
            log::debug!(target: "controller", "song: {:?}", event);
        })))?;
        let playing = player.is_playing();
        self.transport = Transport::Song(player);
        Ok(playing)
    }

    /// Stop and release whichever player is active.
    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.transport, Transport::Idle) {
            Transport::Idle => {}
            Transport::Pattern(player) => player.dispose(),
            Transport::Song(player) => player.dispose(),
        }
    }

    /// Stop playback and release the audio device.
    pub fn close_session(&mut self) {
        self.stop();
        self.session = None;
    }

    fn context(&mut self) -> Result<PlayerContext, ControllerError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => Session::open(&self.settings)?,
        };
        let ctx = session.context().clone();
        self.session = Some(session);
        Ok(ctx)
    }

    // --- Offline rendering ---

    pub fn export_pattern(
        &self,
        path: &Path,
        settings: &ExportSettings,
    ) -> Result<ExportSummary, ControllerError> {
        let pattern = self
            .project
            .selected_pattern()
            .ok_or(ControllerError::NoPattern)?;
        Ok(export_pattern(pattern, self.project.bpm(), path, settings)?)
    }

    pub fn export_song(
        &self,
        path: &Path,
        settings: &ExportSettings,
    ) -> Result<ExportSummary, ControllerError> {
        Ok(export_song(self.project.song(), self.project.bpm(), path, settings)?)
    }

    pub fn export_loop(
        &self,
        path: &Path,
        settings: &ExportSettings,
    ) -> Result<ExportSummary, ControllerError> {
        Ok(export_loop(&self.project, path, settings)?)
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}
