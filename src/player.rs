use crate::engine::KeyActuator;
use crate::model::mapper::KeyMap;
use crate::model::note::NoteAtom;
use crate::model::song::{Event, Song};
use anyhow::bail;
use log::{debug, info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

enum ControlMsg {
    Stop,
}

/// Smallest key-down time worth emitting.
const MIN_HOLD_S: f64 = 0.01;
/// Slack reserved at the end of each repeat slot so the release lands
/// before the next trigger.
const SLOT_SLACK_S: f64 = 0.02;
/// Sleeps are chunked so the worker can observe a stop request promptly.
const MAX_SLEEP_CHUNK_S: f64 = 0.050;

enum Flow {
    Continue,
    Cancelled,
}

#[derive(Debug)]
pub struct Player<A: KeyActuator> {
    delay: u64,
    verbose: bool,
    engine: Arc<A>,
    mapping: Arc<KeyMap>,
    schedule: Mutex<Vec<Event>>,
    control_tx: Mutex<Option<Sender<ControlMsg>>>,
    worker_handle: Mutex<Option<JoinHandle<anyhow::Result<()>>>>,
}

impl<A: KeyActuator + 'static> Player<A> {
    pub fn new(engine: A, mapping: KeyMap, verbose: bool, delay: u64) -> Self {
        Self {
            delay,
            verbose,
            engine: Arc::new(engine),
            mapping: Arc::new(mapping),
            schedule: Mutex::new(Vec::new()),
            control_tx: Mutex::new(None),
            worker_handle: Mutex::new(None),
        }
    }

    pub fn load_song(&self, song: Song) -> anyhow::Result<()> {
        let mut unmapped = 0usize;
        for event in song.events.iter() {
            for atom in event.notes.iter() {
                if let NoteAtom::Note(pitch) = atom
                    && self.mapping.key_for(*pitch).is_none()
                {
                    unmapped += 1;
                }
            }
        }

        if unmapped > 0 {
            warn!(
                "{} note(s) have no key mapping and will be rested at play time..!",
                unmapped
            );
        }

        let Ok(mut schedule_lock) = self.schedule.lock() else {
            bail!("Failed to lock the schedule..!");
        };

        info!(
            "Loaded song: '{}' with {} scheduled events..!",
            song.metadata.title.clone().unwrap_or(String::from("No Title")),
            song.events.len()
        );

        *schedule_lock = song.events;

        Ok(())
    }

    pub fn play(&self, join: bool) -> anyhow::Result<()> {
        {
            let Ok(guard) = self.worker_handle.lock() else {
                bail!("Failed to lock worker handle..!")
            };

            if guard.is_some() {
                bail!("Playback already running..!")
            }
        }

        let Ok(schedule) = self.schedule.lock() else {
            bail!("Failed to lock schedule..!")
        };

        let schedule = schedule.clone();

        if schedule.is_empty() {
            bail!("No song loaded..!")
        }

        let engine = Arc::clone(&self.engine);
        let mapping = Arc::clone(&self.mapping);
        let (tx, rx) = mpsc::channel::<ControlMsg>();

        {
            let Ok(mut ctl) = self.control_tx.lock() else {
                bail!("Failed to lock control_tx..!")
            };

            *ctl = Some(tx);
        }

        let delay = self.delay;
        let verbose = self.verbose;
        let handle = thread::spawn(move || {
            run_schedule(&*engine, &mapping, schedule, &rx, verbose, delay)
        });

        if join {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => bail!("Playback thread panicked..!"),
            }
        } else {
            let Ok(mut wh) = self.worker_handle.lock() else {
                bail!("Failed to lock worker handle..!")
            };

            *wh = Some(handle);
        }

        Ok(())
    }

    pub fn stop(&self) -> anyhow::Result<()> {
        let tx = {
            let Ok(mut lock) = self.control_tx.lock() else {
                bail!("Failed to lock control_tx..!")
            };
            lock.take()
        };

        if let Some(tx) = tx {
            let _ = tx.send(ControlMsg::Stop);
        } else {
            bail!("No worker is running playback..!")
        }

        let Ok(mut lock) = self.worker_handle.lock() else {
            bail!("Failed to lock worker_handle..!")
        };

        if let Some(handle) = lock.take() {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => bail!("Playback thread panicked..!"),
            }
            debug!("Playback thread joined..!");
            info!("Stopped playback thread..!");
        }

        Ok(())
    }
}

fn run_schedule<A: KeyActuator>(
    engine: &A,
    mapping: &KeyMap,
    schedule: Vec<Event>,
    ctrl_rx: &Receiver<ControlMsg>,
    verbose: bool,
    delay: u64,
) -> anyhow::Result<()> {
    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);

    info!(
        "Starting playback {}..!",
        if delay > 0 {
            format!("in {} seconds", delay)
        } else {
            "now".to_owned()
        }
    );

    if delay > 0 && pace(&sleeper, ctrl_rx, delay as f64) {
        warn!("Playback stopped during the start delay..!");
        return Ok(());
    }

    let start = Instant::now();

    for (i, event) in schedule.iter().enumerate() {
        if ctrl_rx.try_recv().is_ok() {
            warn!(
                "Playback stopped via control message after {} seconds..!",
                start.elapsed().as_secs()
            );
            return Ok(());
        }

        if verbose {
            let label = event
                .notes
                .iter()
                .map(|atom| match atom {
                    NoteAtom::Rest => String::from("R"),
                    NoteAtom::Note(p) => p.to_string(),
                })
                .collect::<Vec<_>>()
                .join("+");

            info!(
                "Event {:>4}: {:12} | duration: {:>7.3}s | hold: {:.3}s | stagger: {:.3}s | rep: {}",
                i, label, event.duration_s, event.hold_s, event.stagger_s, event.repeat
            );
        }

        match play_event(engine, mapping, &sleeper, ctrl_rx, event)? {
            Flow::Continue => {}
            Flow::Cancelled => {
                warn!(
                    "Playback stopped mid-song after {} seconds..!",
                    start.elapsed().as_secs()
                );
                return Ok(());
            }
        }
    }

    info!("Playback thread finished all events..!");

    Ok(())
}

/// Perform one event: a rest, a degraded rest (missing mappings), or
/// `repeat` strummed triggers of the chord.
///
/// The whole event takes `duration_s` of wall time regardless of how
/// hold/stagger/repeat divide it, so tempo is preserved across events.
fn play_event<A: KeyActuator>(
    engine: &A,
    mapping: &KeyMap,
    sleeper: &SpinSleeper,
    ctrl_rx: &Receiver<ControlMsg>,
    event: &Event,
) -> anyhow::Result<Flow> {
    if event.is_rest() {
        return Ok(cancellable(pace(sleeper, ctrl_rx, event.duration_s)));
    }

    let mut keys: Vec<&str> = Vec::new();
    let mut missing: Vec<String> = Vec::new();

    for atom in event.notes.iter() {
        let NoteAtom::Note(pitch) = atom else {
            continue;
        };

        match mapping.key_for(*pitch) {
            Some(key) => keys.push(key),
            None => missing.push(pitch.to_string()),
        }
    }

    if !missing.is_empty() {
        warn!(
            "No mapping for [{}]; resting for {:.3}s instead..!",
            missing.join(", "),
            event.duration_s
        );
        return Ok(cancellable(pace(sleeper, ctrl_rx, event.duration_s)));
    }

    let slot = event.duration_s / event.repeat.max(1) as f64;
    let used_hold = event.hold_s.min((slot - SLOT_SLACK_S).max(MIN_HOLD_S));

    for _ in 0..event.repeat.max(1) {
        if ctrl_rx.try_recv().is_ok() {
            return Ok(Flow::Cancelled);
        }

        // Any key pressed through the guard is released when it drops,
        // so cancellation or an actuator error mid-strum cannot leave
        // keys wedged down.
        let mut strum = StrumGuard::new(engine);

        for (i, key) in keys.iter().enumerate() {
            strum.press(key)?;

            if event.stagger_s > 0.0
                && i < keys.len() - 1
                && pace(sleeper, ctrl_rx, event.stagger_s)
            {
                return Ok(Flow::Cancelled);
            }
        }

        if pace(sleeper, ctrl_rx, used_hold) {
            return Ok(Flow::Cancelled);
        }

        // Release in reverse press order, staggered like the downstroke.
        while strum.release_last()? {
            if event.stagger_s > 0.0 && pace(sleeper, ctrl_rx, event.stagger_s) {
                return Ok(Flow::Cancelled);
            }
        }

        let remainder = slot - used_hold;
        if remainder > 0.0 && pace(sleeper, ctrl_rx, remainder) {
            return Ok(Flow::Cancelled);
        }
    }

    Ok(Flow::Continue)
}

fn cancellable(cancelled: bool) -> Flow {
    if cancelled { Flow::Cancelled } else { Flow::Continue }
}

/// Sleep in cancellable chunks. Returns true if a stop was requested.
fn pace(sleeper: &SpinSleeper, ctrl_rx: &Receiver<ControlMsg>, secs: f64) -> bool {
    let mut remaining = secs;

    while remaining > 0.0 {
        if ctrl_rx.try_recv().is_ok() {
            return true;
        }

        let chunk = remaining.min(MAX_SLEEP_CHUNK_S);
        sleeper.sleep(Duration::from_secs_f64(chunk));
        remaining -= chunk;
    }

    false
}

/// Scoped chord hold: every pressed key is released on drop if it wasn't
/// released explicitly.
struct StrumGuard<'a, A: KeyActuator> {
    engine: &'a A,
    held: Vec<String>,
}

impl<'a, A: KeyActuator> StrumGuard<'a, A> {
    fn new(engine: &'a A) -> Self {
        Self {
            engine,
            held: Vec::new(),
        }
    }

    fn press(&mut self, key: &str) -> anyhow::Result<()> {
        self.engine.key_down(key)?;
        self.held.push(key.to_string());
        Ok(())
    }

    /// Release the most recently pressed key still held.
    /// Returns true while keys remain held afterwards.
    fn release_last(&mut self) -> anyhow::Result<bool> {
        if let Some(key) = self.held.pop() {
            self.engine.key_up(&key)?;
        }

        Ok(!self.held.is_empty())
    }
}

impl<A: KeyActuator> Drop for StrumGuard<'_, A> {
    fn drop(&mut self) {
        for key in self.held.drain(..).rev() {
            if let Err(why) = self.engine.key_up(&key) {
                warn!("Failed to release '{}' during cleanup: {:?}", key, why);
            }
        }
    }
}
