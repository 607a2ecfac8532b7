use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::error::AppError;
use crate::lock::OverlayPresenter;
use crate::matcher::InputCode;
use crate::session::{Session, SessionOptions, SessionStatus};
use crossbeam_channel::{after, never, select, tick, unbounded, Receiver, Sender};
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Events delivered to the session thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Input(InputCode),
    ExternalStop,
    Reconfigure(MonitorConfig),
    Stop,
}

/// Lock a mutex, recovering from poisoning if necessary
fn safe_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{context} mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Handle to a session running on its own thread.
///
/// Dropping the handle stops the session and joins the thread.
pub struct SessionHandle {
    commands: Sender<SessionCommand>,
    status: Arc<Mutex<SessionStatus>>,
    thread: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Move `session` onto a dedicated thread that ticks it every
    /// `options.tick_interval` and applies commands in arrival order.
    pub fn spawn<P, C>(session: Session<P>, options: SessionOptions, clock: C) -> Result<Self, AppError>
    where
        P: OverlayPresenter + 'static,
        C: Clock + 'static,
    {
        let (commands, command_rx) = unbounded();
        let status = Arc::new(Mutex::new(session.status()));
        let shared_status = Arc::clone(&status);

        let thread = thread::Builder::new()
            .name("usagelock-session".into())
            .spawn(move || run_loop(session, options, &clock, &command_rx, &shared_status))?;

        Ok(Self {
            commands,
            status,
            thread: Some(thread),
        })
    }

    pub fn send_input(&self, code: InputCode) -> Result<(), AppError> {
        self.send(SessionCommand::Input(code))
    }

    /// External stop signal: treated exactly like a matched unlock sequence.
    pub fn request_close(&self) -> Result<(), AppError> {
        self.send(SessionCommand::ExternalStop)
    }

    pub fn reconfigure(&self, config: MonitorConfig) -> Result<(), AppError> {
        self.send(SessionCommand::Reconfigure(config))
    }

    /// Latest status snapshot published by the session thread.
    pub fn status(&self) -> SessionStatus {
        safe_lock(&self.status, "Session status").clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop ticking, close the overlay if it is up and wait for the thread.
    pub fn stop(mut self) -> Result<(), AppError> {
        self.shutdown()
    }

    fn send(&self, command: SessionCommand) -> Result<(), AppError> {
        self.commands.send(command).map_err(|_| AppError::SessionClosed)
    }

    fn shutdown(&mut self) -> Result<(), AppError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // The thread may already be gone; joining is what matters.
        let _ = self.commands.send(SessionCommand::Stop);
        thread
            .join()
            .map_err(|_| AppError::Internal("session thread panicked".into()))
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Session shutdown failed: {e}");
        }
    }
}

fn timeout_receiver(deadline: Option<i64>, now: i64) -> Receiver<Instant> {
    match deadline {
        Some(deadline) => {
            let wait_ms = u64::try_from(deadline.saturating_sub(now)).unwrap_or(0);
            after(Duration::from_millis(wait_ms))
        }
        None => never(),
    }
}

fn run_loop<P: OverlayPresenter, C: Clock>(
    mut session: Session<P>,
    options: SessionOptions,
    clock: &C,
    commands: &Receiver<SessionCommand>,
    status: &Mutex<SessionStatus>,
) {
    let ticker = tick(options.tick_interval);

    loop {
        let timeout = timeout_receiver(session.next_deadline(), clock.now_millis());

        select! {
            recv(ticker) -> _ => {
                session.tick(clock.now_millis());
            }
            recv(commands) -> command => match command {
                Ok(SessionCommand::Input(code)) => {
                    session.handle_input(code, clock.now_millis());
                }
                Ok(SessionCommand::ExternalStop) => {
                    session.external_stop(clock.now_millis());
                }
                Ok(SessionCommand::Reconfigure(config)) => {
                    session.reconfigure(config, clock.now_millis());
                }
                Ok(SessionCommand::Stop) | Err(_) => break,
            },
            recv(timeout) -> _ => {
                session.expire_sequence(clock.now_millis());
            }
        }

        *safe_lock(status, "Session status") = session.status();
    }

    debug!("Session loop exiting");
    session.stop(clock.now_millis());
}
