//! JSON-lines event feed
//!
//! Reads one event payload per line from a file or FIFO on a background
//! thread and forwards the events into the event channel. Lets any external
//! process drive the visualizer.

use crate::error::{Error, Result};
use crate::event::{PianoEvent, EVENT_CHANNEL};
use crossbeam_channel::Sender;
use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Background reader for a JSON-lines feed
pub struct FeedReader {
    path: PathBuf,
    /// Shutdown flag
    shutdown: Arc<AtomicBool>,
    /// Reader thread handle
    _thread: JoinHandle<()>,
}

impl FeedReader {
    /// Open `path` and start forwarding its events to `tx`
    pub fn spawn(path: impl AsRef<Path>, tx: Sender<PianoEvent>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|e| Error::Feed(format!("cannot open {}: {}", path.display(), e)))?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let source = path.display().to_string();

        let thread = thread::spawn(move || {
            let forwarded = read_events(BufReader::new(file), &tx, &shutdown_clone);
            info!("Feed {} ended after {} events", source, forwarded);
        });

        info!("Forwarding {} events from {}", EVENT_CHANNEL, path.display());
        Ok(Self {
            path,
            shutdown,
            _thread: thread,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FeedReader {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Parse one feed line. Blank lines yield None; malformed lines are logged
/// and yield None.
pub fn parse_line(line: &str) -> Option<PianoEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match PianoEvent::from_json(line) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Skipping malformed feed line '{}': {}", line, e);
            None
        }
    }
}

/// Forward every valid event from `reader` until EOF, a read error, a
/// closed channel or shutdown. Returns the number of events forwarded.
pub fn read_events<R: BufRead>(reader: R, tx: &Sender<PianoEvent>, shutdown: &AtomicBool) -> usize {
    let mut forwarded = 0;
    for line in reader.lines() {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Feed read error: {}", e);
                break;
            }
        };
        if let Some(event) = parse_line(&line) {
            if tx.send(event).is_err() {
                break;
            }
            forwarded += 1;
        }
    }
    forwarded
}
