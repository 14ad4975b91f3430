use crate::engine::{FrameRenderer, SoundEngine};
use crate::model::config::ViewConfig;
use crate::model::song::Song;
use crate::session::{PlaybackSession, PlaybackState};
use anyhow::{anyhow, bail};
use log::{debug, info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

enum ControlMsg {
    Stop,
}

/// Drives a [`PlaybackSession`] from a frame loop on its own thread.
///
/// The loop is the only writer of the session clock. `stop` joins it, so once
/// `stop` returns no frame is left scheduled.
pub struct Player<E: SoundEngine + FrameRenderer> {
    delay: u64,
    engine: Arc<E>,
    session: Arc<Mutex<Option<PlaybackSession>>>,
    control_tx: Mutex<Option<Sender<ControlMsg>>>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<E: SoundEngine + FrameRenderer + 'static> Player<E> {
    pub fn new(engine: E, delay: u64) -> Self {
        Self {
            delay,
            engine: Arc::new(engine),
            session: Arc::new(Mutex::new(None)),
            control_tx: Mutex::new(None),
            worker_handle: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn load_song(&self, song: Song, config: ViewConfig) -> anyhow::Result<()> {
        if self.is_playing()? {
            bail!("Cannot load a song while playing..!");
        }

        let title = song
            .metadata
            .title
            .clone()
            .unwrap_or(String::from("No Title"));
        let voices = song.voices.len();
        let notes = song.note_count();

        let Ok(mut session) = self.session.lock() else {
            bail!("Failed to lock the session..!");
        };
        *session = Some(PlaybackSession::new(song, config));

        info!(
            "Loaded song: '{}' with {} voice(s) and {} notes..!",
            title, voices, notes
        );

        Ok(())
    }

    /// Current clock and state of the loaded session.
    pub fn position(&self) -> anyhow::Result<Option<(PlaybackState, f64)>> {
        let Ok(session) = self.session.lock() else {
            bail!("Failed to lock the session..!");
        };

        Ok(session.as_ref().map(|s| (s.state(), s.clock())))
    }

    pub fn is_playing(&self) -> anyhow::Result<bool> {
        let Ok(mut guard) = self.worker_handle.lock() else {
            bail!("Failed to lock worker handle..!")
        };

        let finished = guard.as_ref().is_some_and(|handle| handle.is_finished());
        if finished && let Some(handle) = guard.take() {
            let _ = handle.join();
            debug!("Reaped finished playback thread..!");
        }

        Ok(guard.is_some())
    }

    /// Plays from time 0. Does nothing if playback is already running.
    /// With `join`, blocks until the song ends or `stop` is called elsewhere.
    pub fn play(&self, join: bool) -> anyhow::Result<()> {
        if self.is_playing()? {
            debug!("Playback already running, ignoring play..!");
            return Ok(());
        }

        {
            let Ok(session) = self.session.lock() else {
                bail!("Failed to lock the session..!")
            };

            match session.as_ref() {
                None => bail!("No song loaded..!"),
                Some(s) if s.song().voices.is_empty() => bail!("Loaded song has no notes..!"),
                Some(s) if s.state() == PlaybackState::Playing => {
                    debug!("Session already playing, ignoring play..!");
                    return Ok(());
                }
                Some(_) => {}
            }
        }

        let (tx, rx) = mpsc::channel::<ControlMsg>();

        {
            // held across spawn so `stop` never sees a sender without its handle
            let Ok(mut wh) = self.worker_handle.lock() else {
                bail!("Failed to lock worker handle..!")
            };

            let Ok(mut ctl) = self.control_tx.lock() else {
                bail!("Failed to lock control_tx..!")
            };

            let engine = Arc::clone(&self.engine);
            let session = Arc::clone(&self.session);
            let delay = self.delay;

            *ctl = Some(tx);
            *wh = Some(thread::spawn(move || run_frame_loop(engine, session, rx, delay)));
        }

        if join {
            self.wait_for_worker()?;
        }

        Ok(())
    }

    /// Blocks until the frame loop ends on its own or `stop` has taken it over.
    fn wait_for_worker(&self) -> anyhow::Result<()> {
        loop {
            let finished = {
                let Ok(mut wh) = self.worker_handle.lock() else {
                    bail!("Failed to lock worker handle..!")
                };

                match wh.as_ref().map(JoinHandle::is_finished) {
                    None => return Ok(()),
                    Some(true) => wh.take(),
                    Some(false) => None,
                }
            };

            if let Some(handle) = finished {
                return handle
                    .join()
                    .map_err(|_| anyhow!("Playback thread panicked..!"));
            }

            thread::sleep(JOIN_POLL_INTERVAL);
        }
    }

    /// Halts playback, rewinds to 0 and releases every sounding note.
    /// Stopping when nothing plays is not an error.
    pub fn stop(&self) -> anyhow::Result<()> {
        let (tx, handle) = {
            let Ok(mut wh) = self.worker_handle.lock() else {
                bail!("Failed to lock worker_handle..!")
            };

            let Ok(mut ctl) = self.control_tx.lock() else {
                bail!("Failed to lock control_tx..!")
            };

            (ctl.take(), wh.take())
        };

        if let Some(tx) = tx {
            let _ = tx.send(ControlMsg::Stop);
        }

        if let Some(handle) = handle {
            let _ = handle.join();
            debug!("Playback thread joined..!");
            info!("Stopped playback thread..!");
        }

        {
            let Ok(mut session) = self.session.lock() else {
                bail!("Failed to lock the session..!")
            };

            if let Some(session) = session.as_mut() {
                session.stop();
            }
        }

        self.engine.release_all()
    }
}

fn run_frame_loop<E: SoundEngine + FrameRenderer>(
    engine: Arc<E>,
    session: Arc<Mutex<Option<PlaybackSession>>>,
    ctrl_rx: Receiver<ControlMsg>,
    delay: u64,
) {
    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
    const MAX_SLEEP_CHUNK_S: f64 = 0.050;

    if delay > 0 {
        info!("Starting playback in {} seconds..!", delay);
        let target = Instant::now() + Duration::from_secs(delay);

        while Instant::now() < target {
            if ctrl_rx.try_recv().is_ok() {
                warn!("Playback stopped during start delay..!");
                return;
            }

            let remaining = target.saturating_duration_since(Instant::now()).as_secs_f64();
            sleeper.sleep(Duration::from_secs_f64(remaining.clamp(0.0, MAX_SLEEP_CHUNK_S)));
        }
    }

    let frame_interval = {
        let Ok(mut guard) = session.lock() else {
            warn!("Failed to lock the session, playback aborted..!");
            return;
        };

        let Some(s) = guard.as_mut() else {
            warn!("No song loaded, playback aborted..!");
            return;
        };

        s.start();
        s.config().frame_interval_seconds()
    };

    let start = Instant::now();
    info!("Playback started..!");

    loop {
        if ctrl_rx.try_recv().is_ok() {
            if let Ok(mut guard) = session.lock()
                && let Some(s) = guard.as_mut()
            {
                s.stop();
            }
            if let Err(why) = engine.release_all() {
                warn!("Failed to release notes: {:?}", why);
            }
            warn!(
                "Playback stopped via control message after {:.3} seconds..!",
                start.elapsed().as_secs_f64()
            );
            return;
        }

        let elapsed = start.elapsed().as_secs_f64();

        let (triggers, frame, finished) = {
            let Ok(mut guard) = session.lock() else {
                warn!("Failed to lock the session, playback aborted..!");
                return;
            };

            let Some(s) = guard.as_mut() else {
                warn!("Song unloaded during playback..!");
                return;
            };

            (s.advance(elapsed), s.frame(elapsed), s.is_finished())
        };

        for trigger in triggers.iter() {
            if let Err(why) = engine.trigger(trigger) {
                warn!(
                    "Sound error for {} at {:.3}s | why: {:?}",
                    trigger.pitch_name, elapsed, why
                );
            }
        }

        if let Some(frame) = frame {
            engine.render(&frame);
        }

        if finished {
            break;
        }

        sleeper.sleep(Duration::from_secs_f64(
            frame_interval.clamp(0.001, MAX_SLEEP_CHUNK_S),
        ));
    }

    if let Ok(mut guard) = session.lock()
        && let Some(s) = guard.as_mut()
    {
        s.stop();
    }

    info!("Playback thread finished all notes..!");
}
