//! Listen and Record toggles
//!
//! Each toggle flips optimistically when clicked and then settles on the
//! backend's answer: a rejected or failed command reverts it. The two
//! toggles exclude each other; while one is on the other is disabled.

use crate::backend::Backend;
use crate::error::Result;
use log::{info, warn};
use std::time::{Duration, Instant};

/// Default name a stopped recording is stored under
pub const DEFAULT_RECORDING_NAME: &str = "First recording";

/// Default delay between stopping a recording and replaying it
pub const DEFAULT_AUTOPLAY_DELAY_MS: u64 = 500;

/// A two-state control with a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Toggle {
    confirmed: bool,
    pending: Option<bool>,
}

impl Toggle {
    /// Displayed state: the pending request if any, else the confirmed one
    pub fn is_on(&self) -> bool {
        self.pending.unwrap_or(self.confirmed)
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Flip the displayed state; returns the requested state
    pub fn request(&mut self) -> bool {
        let target = !self.is_on();
        self.pending = Some(target);
        target
    }

    /// The backend accepted the pending request
    pub fn confirm(&mut self) {
        if let Some(target) = self.pending.take() {
            self.confirmed = target;
        }
    }

    /// The backend refused the pending request
    pub fn reject(&mut self) {
        self.pending = None;
    }

    /// Adopt an observed backend state unless a request is in flight
    pub fn observe(&mut self, on: bool) {
        if self.pending.is_none() {
            self.confirmed = on;
        }
    }
}

/// The control bar state
#[derive(Debug, Clone)]
pub struct Controls {
    listen: Toggle,
    record: Toggle,
    recording_name: String,
    autoplay_delay: Option<Duration>,
    scheduled_play: Option<Instant>,
}

impl Default for Controls {
    fn default() -> Self {
        Self::new(
            DEFAULT_RECORDING_NAME,
            Some(Duration::from_millis(DEFAULT_AUTOPLAY_DELAY_MS)),
        )
    }
}

impl Controls {
    /// `autoplay_delay` of None disables replay after a recording stops
    pub fn new(recording_name: impl Into<String>, autoplay_delay: Option<Duration>) -> Self {
        Self {
            listen: Toggle::default(),
            record: Toggle::default(),
            recording_name: recording_name.into(),
            autoplay_delay,
            scheduled_play: None,
        }
    }

    pub fn listen(&self) -> Toggle {
        self.listen
    }

    pub fn record(&self) -> Toggle {
        self.record
    }

    pub fn recording_name(&self) -> &str {
        &self.recording_name
    }

    pub fn listen_enabled(&self) -> bool {
        !self.record.is_on()
    }

    pub fn record_enabled(&self) -> bool {
        !self.listen.is_on()
    }

    /// When the pending autoplay fires, if one is scheduled
    pub fn scheduled_play(&self) -> Option<Instant> {
        self.scheduled_play
    }

    /// Flip Listen. Returns false if the toggle is disabled.
    pub fn toggle_listen<B: Backend + ?Sized>(&mut self, backend: &mut B) -> bool {
        if !self.listen_enabled() {
            return false;
        }
        let start = self.listen.request();
        let result = if start {
            backend.start_capture()
        } else {
            backend.stop_capture()
        };
        let accepted = settle(&mut self.listen, result, if start { "start capture" } else { "stop capture" });
        self.reconcile(backend);
        accepted
    }

    /// Flip Record. Stopping stores the recording and, with autoplay on,
    /// schedules its replay. Returns false if the toggle is disabled.
    pub fn toggle_record<B: Backend + ?Sized>(&mut self, backend: &mut B, now: Instant) -> bool {
        if !self.record_enabled() {
            return false;
        }
        let start = self.record.request();
        let result = if start {
            backend.start_recording()
        } else {
            backend.stop_recording(&self.recording_name)
        };
        let accepted = settle(&mut self.record, result, if start { "start recording" } else { "stop recording" });
        if accepted && !start {
            if let Some(delay) = self.autoplay_delay {
                self.scheduled_play = Some(now + delay);
            }
        }
        self.reconcile(backend);
        accepted
    }

    /// Fire a due autoplay; call once per frame
    pub fn tick<B: Backend + ?Sized>(&mut self, backend: &mut B, now: Instant) {
        if self.scheduled_play.is_some_and(|at| now >= at) {
            self.scheduled_play = None;
            match backend.play_recording() {
                Ok(true) => info!("Replaying '{}'", self.recording_name),
                Ok(false) => warn!("Play recording was rejected"),
                Err(e) => warn!("Play recording failed: {}", e),
            }
        }
    }

    /// Align the confirmed states with the backend's listening state
    pub fn reconcile<B: Backend + ?Sized>(&mut self, backend: &B) {
        match backend.is_listening() {
            Ok(listening) => {
                if self.record.is_confirmed() {
                    self.record.observe(listening);
                } else {
                    self.listen.observe(listening);
                }
            }
            Err(e) => warn!("Could not query listening state: {}", e),
        }
    }
}

fn settle(toggle: &mut Toggle, result: Result<bool>, action: &str) -> bool {
    match result {
        Ok(true) => {
            toggle.confirm();
            true
        }
        Ok(false) => {
            warn!("Backend rejected {}", action);
            toggle.reject();
            false
        }
        Err(e) => {
            warn!("Backend failed to {}: {}", action, e);
            toggle.reject();
            false
        }
    }
}
