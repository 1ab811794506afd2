//! Backend bridge
//!
//! The visualizer reaches capture and recording only through the
//! [`Backend`] trait. [`LocalBackend`] is the in-process implementation the
//! binary ships with: it captures computer-keyboard input through
//! [`KeyCapture`], records emitted events in memory and replays them on a
//! background thread.

use crate::capture::KeyCapture;
use crate::error::{Error, Result};
use crate::event::PianoEvent;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Request/response bridge to the capture and recording backend
pub trait Backend {
    /// Whether a capture session (plain or recording) is running
    fn is_listening(&self) -> Result<bool>;

    /// Begin producing events
    fn start_capture(&mut self) -> Result<bool>;

    /// Stop producing events
    fn stop_capture(&mut self) -> Result<bool>;

    /// Begin a capture session that buffers every emitted event
    fn start_recording(&mut self) -> Result<bool>;

    /// End the recording session and keep its events under `name`
    fn stop_recording(&mut self, name: &str) -> Result<bool>;

    /// Replay the most recently stored recording as a new event stream
    fn play_recording(&mut self) -> Result<bool>;
}

/// Recorded events with the delay before each one
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    events: Vec<(Duration, PianoEvent)>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delay: Duration, event: PianoEvent) {
        self.events.push((delay, event));
    }

    pub fn events(&self) -> &[(Duration, PianoEvent)] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sum of all delays
    pub fn duration(&self) -> Duration {
        self.events.iter().map(|(delay, _)| *delay).sum()
    }
}

/// A running capture session
#[derive(Debug)]
struct Session {
    recording: Option<Recording>,
    last_event: Option<Instant>,
}

impl Session {
    fn new(record: bool) -> Self {
        Self {
            recording: record.then(Recording::new),
            last_event: None,
        }
    }

    fn record(&mut self, event: &PianoEvent, now: Instant) {
        if let Some(recording) = self.recording.as_mut() {
            let delay = self
                .last_event
                .map(|last| now.saturating_duration_since(last))
                .unwrap_or_default();
            recording.push(delay, event.clone());
        }
        self.last_event = Some(now);
    }
}

/// A replay running on a background thread
struct Playback {
    stop_sender: Sender<()>,
    handle: JoinHandle<()>,
}

impl Playback {
    fn spawn(recording: Recording, sender: Sender<PianoEvent>) -> Self {
        let (stop_sender, stop_receiver) = bounded(1);
        let handle = thread::spawn(move || {
            let mut held = BTreeSet::new();
            for (delay, event) in recording.events {
                match stop_receiver.recv_timeout(delay) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                if event.is_press() {
                    held.insert(event.key_id);
                } else if event.is_release() {
                    held.remove(&event.key_id);
                }
                if sender.send(event).is_err() {
                    return;
                }
            }
            // Leave no key stuck down if the replay was cut short
            for key_id in held.into_iter().filter_map(|id| u8::try_from(id).ok()) {
                let _ = sender.send(PianoEvent::release(key_id));
            }
            debug!("Playback finished");
        });
        Self { stop_sender, handle }
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn stop(self) {
        let _ = self.stop_sender.try_send(());
        let _ = self.handle.join();
    }
}

/// In-process backend driven by computer-keyboard input
pub struct LocalBackend {
    sender: Sender<PianoEvent>,
    capture: KeyCapture,
    session: Option<Session>,
    recordings: HashMap<String, Recording>,
    last_saved: Option<String>,
    playback: Option<Playback>,
}

impl LocalBackend {
    /// Events are sent on `sender`, the producer side of the event channel
    pub fn new(sender: Sender<PianoEvent>, capture: KeyCapture) -> Self {
        Self {
            sender,
            capture,
            session: None,
            recordings: HashMap::new(),
            last_saved: None,
            playback: None,
        }
    }

    pub fn capture(&self) -> &KeyCapture {
        &self.capture
    }

    /// Whether the running session is buffering events
    pub fn is_recording(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.recording.is_some())
    }

    /// Whether a replay is still running
    pub fn is_playing(&self) -> bool {
        self.playback.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Stored recording by name
    pub fn recording(&self, name: &str) -> Option<&Recording> {
        self.recordings.get(name)
    }

    /// Name of the most recently stored recording
    pub fn last_recording_name(&self) -> Option<&str> {
        self.last_saved.as_deref()
    }

    /// Terminal key press
    pub fn key_down(&mut self, c: char, now: Instant) {
        if self.session.is_none() {
            return;
        }
        if let Some(event) = self.capture.key_down(c, now) {
            self.emit(event, now);
        }
    }

    /// Terminal key repeat
    pub fn key_repeat(&mut self, c: char, now: Instant) {
        if self.session.is_some() {
            self.capture.touch(c, now);
        }
    }

    /// Terminal key release
    pub fn key_up(&mut self, c: char, now: Instant) {
        if let Some(event) = self.capture.key_up(c) {
            self.emit(event, now);
        }
    }

    /// Release notes whose keys went quiet; call once per frame
    pub fn expire(&mut self, now: Instant) {
        for event in self.capture.expire(now) {
            self.emit(event, now);
        }
    }

    pub fn octave_up(&mut self, now: Instant) {
        for event in self.capture.octave_up() {
            self.emit(event, now);
        }
    }

    pub fn octave_down(&mut self, now: Instant) {
        for event in self.capture.octave_down() {
            self.emit(event, now);
        }
    }

    /// Release everything held and stop any replay
    pub fn shutdown(&mut self, now: Instant) {
        self.end_session(now);
        if let Some(playback) = self.playback.take() {
            playback.stop();
        }
    }

    fn emit(&mut self, event: PianoEvent, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            session.record(&event, now);
        }
        // The receiver only goes away on shutdown
        let _ = self.sender.send(event);
    }

    fn end_session(&mut self, now: Instant) -> Option<Session> {
        for event in self.capture.release_all() {
            self.emit(event, now);
        }
        self.session.take()
    }
}

impl Backend for LocalBackend {
    fn is_listening(&self) -> Result<bool> {
        Ok(self.session.is_some())
    }

    fn start_capture(&mut self) -> Result<bool> {
        if self.session.is_some() {
            warn!("Already listening");
            return Ok(false);
        }
        self.session = Some(Session::new(false));
        info!("Capture started");
        Ok(true)
    }

    fn stop_capture(&mut self) -> Result<bool> {
        match self.end_session(Instant::now()) {
            Some(_) => {
                info!("Capture stopped");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn start_recording(&mut self) -> Result<bool> {
        if self.end_session(Instant::now()).is_some() {
            info!("Replacing running capture session with a recording session");
        }
        self.session = Some(Session::new(true));
        info!("Recording started");
        Ok(true)
    }

    fn stop_recording(&mut self, name: &str) -> Result<bool> {
        if !self.is_recording() {
            return Err(Error::Backend("not recording".to_string()));
        }
        let recording = self
            .end_session(Instant::now())
            .and_then(|session| session.recording)
            .unwrap_or_default();
        info!("Stored recording '{}' ({} events)", name, recording.len());
        self.recordings.insert(name.to_string(), recording);
        self.last_saved = Some(name.to_string());
        Ok(true)
    }

    fn play_recording(&mut self) -> Result<bool> {
        let Some(recording) = self
            .last_saved
            .as_ref()
            .and_then(|name| self.recordings.get(name))
            .cloned()
        else {
            warn!("No recording to play");
            return Ok(false);
        };
        if let Some(previous) = self.playback.take() {
            previous.stop();
        }
        info!("Playing recording ({} events, {:?})", recording.len(), recording.duration());
        self.playback = Some(Playback::spawn(recording, self.sender.clone()));
        Ok(true)
    }
}

impl Drop for LocalBackend {
    fn drop(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Receiver};

    fn backend() -> (LocalBackend, Receiver<PianoEvent>) {
        let (tx, rx) = unbounded();
        (LocalBackend::new(tx, KeyCapture::default()), rx)
    }

    #[test]
    fn test_capture_session() {
        let (mut backend, rx) = backend();
        let now = Instant::now();

        // Not listening: input is ignored
        backend.key_down('c', now);
        assert!(rx.try_recv().is_err());
        assert!(!backend.is_listening().unwrap());

        assert!(backend.start_capture().unwrap());
        assert!(!backend.start_capture().unwrap());
        assert!(backend.is_listening().unwrap());

        backend.key_down('c', now);
        let event = rx.try_recv().unwrap();
        assert!(event.is_press());
        assert_eq!(event.key_id, 48);

        // Stopping releases held notes
        assert!(backend.stop_capture().unwrap());
        let event = rx.try_recv().unwrap();
        assert!(event.is_release());
        assert_eq!(event.key_id, 48);
        assert!(!backend.is_listening().unwrap());
        assert!(!backend.stop_capture().unwrap());
    }

    #[test]
    fn test_recording_keeps_delays() {
        let (mut backend, _rx) = backend();
        let start = Instant::now();
        assert!(backend.start_recording().unwrap());
        assert!(backend.is_listening().unwrap());
        assert!(backend.is_recording());

        backend.key_down('c', start);
        backend.key_up('c', start + Duration::from_millis(250));
        backend.key_down('v', start + Duration::from_millis(400));
        backend.key_up('v', start + Duration::from_millis(500));

        assert!(backend.stop_recording("First recording").unwrap());
        assert!(!backend.is_listening().unwrap());

        let recording = backend.recording("First recording").unwrap();
        let delays: Vec<u64> = recording.events().iter().map(|(d, _)| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![0, 250, 150, 100]);
        assert_eq!(recording.duration(), Duration::from_millis(500));
        assert_eq!(backend.last_recording_name(), Some("First recording"));
    }

    #[test]
    fn test_stop_recording_without_session_fails() {
        let (mut backend, _rx) = backend();
        assert!(backend.stop_recording("x").is_err());
        backend.start_capture().unwrap();
        assert!(backend.stop_recording("x").is_err());
    }

    #[test]
    fn test_recording_replaces_capture_session() {
        let (mut backend, rx) = backend();
        let now = Instant::now();
        backend.start_capture().unwrap();
        backend.key_down('c', now);
        rx.try_recv().unwrap();

        backend.start_recording().unwrap();
        // The held note from the plain session was released
        assert!(rx.try_recv().unwrap().is_release());
        assert!(backend.is_recording());
    }

    #[test]
    fn test_play_without_recording() {
        let (mut backend, _rx) = backend();
        assert!(!backend.play_recording().unwrap());
    }

    #[test]
    fn test_playback_replays_in_order() {
        let (mut backend, rx) = backend();
        let start = Instant::now();
        backend.start_recording().unwrap();
        backend.key_down('c', start);
        backend.key_down('v', start + Duration::from_millis(5));
        backend.key_up('c', start + Duration::from_millis(10));
        backend.key_up('v', start + Duration::from_millis(15));
        backend.stop_recording("take").unwrap();
        while rx.try_recv().is_ok() {}

        assert!(backend.play_recording().unwrap());
        let replayed: Vec<(i32, bool)> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .map(|e| (e.key_id, e.is_press()))
            .collect();
        assert_eq!(replayed, vec![(48, true), (50, true), (48, false), (50, false)]);
    }

    #[test]
    fn test_interrupted_playback_releases_held_keys() {
        let (mut backend, rx) = backend();
        let start = Instant::now();
        backend.start_recording().unwrap();
        backend.key_down('c', start);
        backend.key_up('c', start + Duration::from_secs(30));
        backend.stop_recording("long").unwrap();
        while rx.try_recv().is_ok() {}

        backend.play_recording().unwrap();
        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(first.is_press());

        backend.shutdown(Instant::now());
        let last = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(last.is_release());
        assert_eq!(last.key_id, 48);
        assert!(!backend.is_playing());
    }
}
