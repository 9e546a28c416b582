use crate::block::{Publisher, Update, Worker};
use crate::error::BlockError;
use crate::protocol::{color, ClickEvent};
use libpulse_binding::callbacks::ListResult;
use libpulse_binding::context::subscribe::{Facility, InterestMaskSet, Operation};
use libpulse_binding::context::{self, introspect::SinkInfo};
use libpulse_binding::context::{Context, FlagSet as ContextFlagSet};
use libpulse_binding::mainloop::standard::{IterateResult, Mainloop};
use libpulse_binding::volume::{ChannelVolumes, Volume};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Pause before talking to a restarted server again
const RECONNECT_DELAY: Duration = Duration::from_secs(2);
/// How often the command thread checks whether its session ended
const COMMAND_POLL: Duration = Duration::from_millis(500);
/// Volume change per scroll step, in percent
const STEP: f32 = 5.0;

#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    #[error("Failed to create mainloop")]
    NoMainloop,
    #[error("Failed to create context")]
    NoContext,
    #[error("Failed to connect context")]
    Connect,
    #[error("Iteration failed")]
    IterationFailed,
    #[error("Context terminated")]
    ContextTerminated,
}

pub enum VolumeCommand {
    OpenMixer,
    VolUp,
    VolDown,
    ToggleMute,
}

/// Drives the PulseAudio connection
pub struct Pulse {
    mixer: Vec<String>,
}

impl Pulse {
    /// `mixer` is the command line started on left click
    #[must_use]
    pub fn new(mixer: Vec<String>) -> Self {
        Self { mixer }
    }
}

/// How a connection ended
enum Session {
    /// The block is gone
    Closed,
    /// The server went away
    Disconnected,
}

impl Worker for Pulse {
    type Command = VolumeCommand;

    fn command(event: &ClickEvent) -> Option<VolumeCommand> {
        match event.button {
            1 => Some(VolumeCommand::OpenMixer),
            3 => Some(VolumeCommand::ToggleMute),
            4 => Some(VolumeCommand::VolUp),
            5 => Some(VolumeCommand::VolDown),
            _ => None,
        }
    }

    fn run(self, updates: &Publisher, commands: Receiver<VolumeCommand>) -> Result<(), BlockError> {
        let commands = Arc::new(Mutex::new(commands));
        loop {
            match session(&self.mixer, updates, &commands)? {
                Session::Closed => return Ok(()),
                Session::Disconnected => {
                    tracing::warn!("Lost connection to PulseAudio, reconnecting");
                    std::thread::sleep(RECONNECT_DELAY);
                }
            }
        }
    }
}

fn render(volume: u32, muted: bool) -> Update {
    if muted {
        Update::new("muted").color(Some(color::URGENT))
    } else {
        Update::new(format!("{volume}%"))
    }
}

struct State {
    volume: u32,
    muted: bool,
    default_sink_index: Option<u32>,
    default_sink_name: Option<String>,
    raw_volume: Option<ChannelVolumes>,
}

#[allow(clippy::too_many_lines)]
fn session(
    mixer: &[String],
    updates: &Publisher,
    commands: &Arc<Mutex<Receiver<VolumeCommand>>>,
) -> Result<Session, PulseError> {
    // Initialize main loop
    let mainloop = Rc::new(RefCell::new(Mainloop::new().ok_or(PulseError::NoMainloop)?));

    // Initialize context
    let context = Arc::new(RwLock::new(
        Context::new(&*mainloop.borrow(), "blockbar").ok_or(PulseError::NoContext)?,
    ));

    // Prepare state
    let state = Arc::new(RwLock::new(State {
        volume: 0,
        muted: false,
        default_sink_index: None,
        default_sink_name: None,
        raw_volume: None,
    }));

    // Connect the context
    context
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .connect(None, ContextFlagSet::NOFLAGS, None)
        .map_err(|_| PulseError::Connect)?;

    // Wait for context to be ready
    loop {
        match mainloop.borrow_mut().iterate(false) {
            IterateResult::Quit(_) | IterateResult::Err(_) => {
                return Err(PulseError::IterationFailed);
            }
            IterateResult::Success(_) => {}
        }
        match context.read().unwrap_or_else(PoisonError::into_inner).get_state() {
            context::State::Ready => break,
            context::State::Failed | context::State::Terminated => {
                return Err(PulseError::ContextTerminated);
            }
            _ => {}
        }
    }

    // Set subscribe callback
    context
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .set_subscribe_callback(Some(Box::new({
            let context = Arc::clone(&context);
            let state = Arc::clone(&state);
            let updates = updates.clone();
            move |facility, operation, index| {
                // Did something about the default sink change?
                let is_default_sink = Some(index)
                    == state
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .default_sink_index;
                if facility == Some(Facility::Sink)
                    && operation == Some(Operation::Changed)
                    && is_default_sink
                {
                    context
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .introspect()
                        .get_sink_info_by_index(index, {
                            let state = Arc::clone(&state);
                            let updates = updates.clone();
                            move |sink_info| {
                                if let ListResult::Item(sink_info) = sink_info {
                                    parse_sink_info(
                                        sink_info,
                                        &mut state.write().unwrap_or_else(PoisonError::into_inner),
                                        &updates,
                                    );
                                }
                            }
                        });
                }
                // Did the default sink change?
                if facility == Some(Facility::Server) && operation == Some(Operation::Changed) {
                    request_server_info(&context, &state, &updates);
                }
            }
        })));

    // Subscribe to events
    let interest = InterestMaskSet::SERVER | InterestMaskSet::SINK;
    context
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .subscribe(interest, |_| {});

    // Request initial server info
    request_server_info(&context, &state, updates);

    // Handle commands until this session ends
    let alive = Arc::new(AtomicBool::new(true));
    let command_thread = std::thread::spawn({
        let alive = Arc::clone(&alive);
        let context = Arc::clone(&context);
        let state = Arc::clone(&state);
        let commands = Arc::clone(commands);
        let mixer = mixer.to_vec();
        move || {
            while alive.load(Ordering::Relaxed) {
                let received = commands
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .recv_timeout(COMMAND_POLL);
                match received {
                    Ok(command) => handle_command(
                        &command,
                        &mixer,
                        &context,
                        &state.read().unwrap_or_else(PoisonError::into_inner),
                    ),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
        }
    });

    // Main loop
    let ended = loop {
        if updates.is_closed() {
            break Ok(Session::Closed);
        }
        match mainloop.borrow_mut().iterate(true) {
            IterateResult::Quit(_) => {
                tracing::debug!("PulseAudio mainloop quit");
                break Ok(Session::Disconnected);
            }
            IterateResult::Err(_) => break Err(PulseError::IterationFailed),
            IterateResult::Success(_) => {}
        }
        // Die if we disconnected
        if context.read().unwrap_or_else(PoisonError::into_inner).get_state() != context::State::Ready {
            break Ok(Session::Disconnected);
        }
    };

    alive.store(false, Ordering::Relaxed);
    let _idc = command_thread.join();
    ended
}

fn handle_command(
    command: &VolumeCommand,
    mixer: &[String],
    context: &Arc<RwLock<Context>>,
    state: &State,
) {
    if let VolumeCommand::OpenMixer = command {
        open_mixer(mixer);
        return;
    }
    let Some(sink) = state.default_sink_index else {
        return;
    };
    let mut introspect = context
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .introspect();
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let step = Volume((STEP * (Volume::NORMAL.0 as f32 / 100.0)) as u32);
    match command {
        VolumeCommand::VolUp | VolumeCommand::VolDown => {
            let Some(mut volume) = state.raw_volume else {
                return;
            };
            if let VolumeCommand::VolUp = command {
                volume.increase(step);
            } else {
                volume.decrease(step);
            }
            introspect.set_sink_volume_by_index(sink, &volume, None);
        }
        VolumeCommand::ToggleMute => {
            introspect.set_sink_mute_by_index(sink, !state.muted, None);
        }
        VolumeCommand::OpenMixer => {}
    }
}

fn open_mixer(mixer: &[String]) {
    let Some((program, args)) = mixer.split_first() else {
        return;
    };
    match std::process::Command::new(program).args(args).spawn() {
        Ok(mut child) => {
            // Reap it once it exits
            std::thread::spawn(move || child.wait());
        }
        Err(e) => tracing::warn!("Unable to start {program}: {e}"),
    }
}

/// Requests the server info and parses it into the passed state
fn request_server_info(
    context: &Arc<RwLock<Context>>,
    state: &Arc<RwLock<State>>,
    updates: &Publisher,
) {
    context
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .introspect()
        .get_server_info({
            let context = Arc::clone(context);
            let state = Arc::clone(state);
            let updates = updates.clone();
            move |info| {
                let Some(name) = &info.default_sink_name else {
                    return;
                };
                // Do nothing if the sink didnt change
                if Some(name.to_string())
                    == state
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .default_sink_name
                {
                    return;
                }
                // Request info for default sink
                context
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .introspect()
                    .get_sink_info_by_name(name, {
                        let state = Arc::clone(&state);
                        let updates = updates.clone();
                        move |sink_info| {
                            if let ListResult::Item(sink_info) = sink_info {
                                parse_sink_info(
                                    sink_info,
                                    &mut state.write().unwrap_or_else(PoisonError::into_inner),
                                    &updates,
                                );
                            }
                        }
                    });
            }
        });
}

/// Parses sink info into the state
fn parse_sink_info(info: &SinkInfo, state: &mut State, updates: &Publisher) {
    state.default_sink_index = Some(info.index);
    state.default_sink_name = info.name.clone().map(|x| x.to_string());
    state.raw_volume = Some(info.volume);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let volume = ((info.volume.avg().0 as f32 / Volume::NORMAL.0 as f32) * 100.) as u32;
    let muted = info.mute;
    if volume != state.volume || muted != state.muted {
        state.volume = volume;
        state.muted = muted;
        // The session notices a closed block on its own
        let _idc = updates.publish(render(volume, muted));
    }
}
