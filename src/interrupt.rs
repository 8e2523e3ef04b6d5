use std::{future::Future, io, time::Duration};

use log::{debug, warn};
use tokio::{
    runtime::{self, Runtime},
    sync::oneshot,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{Result, TrainErr};

/// Printed once when the first interrupt is observed.
pub const NOTICE: &str = "Caught interrupt. Ctrl+C again to terminate.";

/// Exit status of a process terminated by SIGINT (128 + 2).
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How long a finished call waits for its observer to be torn down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// A source of user interrupts.
///
/// The interactive trainer observes a single interrupt per call: it arms the
/// source, waits for the first interrupt and then disarms it, so any further
/// interrupt takes the platform's default path.
///
/// All methods run inside the observer's runtime.
pub trait InterruptSource: Send + 'static {
    /// Registers with the platform. Called once, before training starts.
    ///
    /// # Errors
    /// Returns the registration failure, the training call reports it as
    /// `TrainErr::Interrupt`.
    fn arm(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Resolves when the first interrupt is delivered.
    fn interrupted(&mut self) -> impl Future<Output = ()> + Send;

    /// Tells the user the interrupt was caught. Called exactly once per call,
    /// after training was told to stop.
    fn notify(&self, notice: &str) {
        println!("\n{notice}");
    }

    /// Stops capturing interrupts.
    fn disarm(self);
}

/// The process interrupt signal (Ctrl+C on a controlling terminal).
///
/// Arming installs a process-wide dispatcher the first time. It stays for the
/// rest of the process and hands each interrupt to the interactive call that is
/// listening, if any. With no call listening it terminates the process with the
/// status of the default disposition.
#[derive(Debug, Default)]
pub struct CtrlC {
    listener: Option<oneshot::Receiver<()>>,
}

impl CtrlC {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InterruptSource for CtrlC {
    fn arm(&mut self) -> io::Result<()> {
        if self.listener.is_none() {
            dispatcher::install()?;
            self.listener = Some(dispatcher::listen()?);
        }

        Ok(())
    }

    fn interrupted(&mut self) -> impl Future<Output = ()> + Send {
        async move {
            if let Some(listener) = self.listener.as_mut() {
                if listener.await.is_ok() {
                    return;
                }
            }

            // Never armed, or the dispatcher is gone: no interrupt will ever arrive.
            std::future::pending::<()>().await
        }
    }

    /// The dispatcher took the listener when it delivered the interrupt, so the
    /// next one already finds nobody listening.
    fn disarm(self) {}
}

/// The process-wide interrupt dispatcher behind `CtrlC`.
mod dispatcher {
    use std::{
        io, process,
        sync::mpsc::{self, SyncSender},
        thread,
    };

    use log::{debug, error};
    use parking_lot::{const_mutex, Mutex};
    use tokio::{runtime, sync::oneshot};

    use super::INTERRUPTED_EXIT_CODE;

    /// The interactive call waiting for the next interrupt.
    static LISTENER: Mutex<Option<oneshot::Sender<()>>> = const_mutex(None);

    static INSTALLED: Mutex<bool> = const_mutex(false);

    /// Starts the dispatcher thread unless it's already running.
    ///
    /// # Errors
    /// If the thread, its runtime or the signal registration can't be created.
    pub(super) fn install() -> io::Result<()> {
        let mut installed = INSTALLED.lock();
        if *installed {
            return Ok(());
        }

        let (registered_tx, registered_rx) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("interrupt-dispatcher".into())
            .spawn(move || run(registered_tx))?;

        registered_rx
            .recv()
            .map_err(|_| io::Error::other("interrupt dispatcher exited before registering"))??;

        *installed = true;
        debug!("interrupt dispatcher installed");
        Ok(())
    }

    /// Registers the calling interactive call as the receiver of the next interrupt.
    ///
    /// # Errors
    /// `io::ErrorKind::AlreadyExists` if another call is still listening.
    pub(super) fn listen() -> io::Result<oneshot::Receiver<()>> {
        let mut listener = LISTENER.lock();
        if listener.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "another interactive call is listening for interrupts",
            ));
        }

        let (tx, rx) = oneshot::channel();
        *listener = Some(tx);
        Ok(rx)
    }

    /// Hands an interrupt to the listening call, or applies the default.
    fn deliver() {
        let listener = LISTENER.lock().take();
        match listener.map(|tx| tx.send(())) {
            Some(Ok(())) => debug!("interrupt delivered"),
            _ => process::exit(INTERRUPTED_EXIT_CODE),
        }
    }

    fn run(registered: SyncSender<io::Result<()>>) {
        let runtime = match runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                let _ = registered.send(Err(e));
                return;
            }
        };

        runtime.block_on(async move {
            let mut interrupts = match Interrupts::register() {
                Ok(interrupts) => interrupts,
                Err(e) => {
                    let _ = registered.send(Err(e));
                    return;
                }
            };
            let _ = registered.send(Ok(()));

            while interrupts.recv().await {
                deliver();
            }

            error!("interrupt stream closed, interrupts are no longer handled");
        });
    }

    #[cfg(unix)]
    struct Interrupts(tokio::signal::unix::Signal);

    #[cfg(unix)]
    impl Interrupts {
        fn register() -> io::Result<Self> {
            use tokio::signal::unix::{signal, SignalKind};

            Ok(Self(signal(SignalKind::interrupt())?))
        }

        async fn recv(&mut self) -> bool {
            self.0.recv().await.is_some()
        }
    }

    #[cfg(windows)]
    struct Interrupts(tokio::signal::windows::CtrlC);

    #[cfg(windows)]
    impl Interrupts {
        fn register() -> io::Result<Self> {
            Ok(Self(tokio::signal::windows::ctrl_c()?))
        }

        async fn recv(&mut self) -> bool {
            self.0.recv().await.is_some()
        }
    }
}

/// Waits for the first interrupt of `source` and flips `killed`.
///
/// Reports through `armed` whether the source could be armed before waiting.
pub(crate) async fn observe<S: InterruptSource>(
    mut source: S,
    killed: CancellationToken,
    armed: oneshot::Sender<io::Result<()>>,
) {
    if let Err(e) = source.arm() {
        let _ = armed.send(Err(e));
        return;
    }

    // The trainer may already be gone if it panicked while waiting.
    let _ = armed.send(Ok(()));

    source.interrupted().await;
    killed.cancel();

    warn!("interrupt received, stopping before the next epoch");
    source.notify(NOTICE);
    source.disarm();
}

/// The background task observing interrupts for one interactive training call.
///
/// Owns a single-worker runtime; dropping the observer aborts the task and waits
/// for the runtime to shut down, so neither the task nor its source outlive the
/// call.
pub(crate) struct Observer {
    runtime: Option<Runtime>,
    task: JoinHandle<()>,
}

impl Observer {
    /// Spawns the observer and blocks until `source` is armed.
    ///
    /// # Errors
    /// `TrainErr::Io` if the runtime can't be built, `TrainErr::Interrupt` if the
    /// source fails to arm.
    ///
    /// # Panics
    /// If called from within an asynchronous execution context.
    pub(crate) fn spawn<S: InterruptSource>(source: S, killed: CancellationToken) -> Result<Self> {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("interrupt-observer")
            .enable_all()
            .build()?;

        let (armed_tx, armed_rx) = oneshot::channel();
        let task = runtime.spawn(observe(source, killed, armed_tx));
        let observer = Self {
            runtime: Some(runtime),
            task,
        };

        match armed_rx.blocking_recv() {
            Ok(Ok(())) => {
                debug!("interrupt observer armed");
                Ok(observer)
            }
            Ok(Err(e)) => Err(TrainErr::Interrupt(e)),
            Err(_) => Err(TrainErr::Interrupt(io::Error::other(
                "interrupt observer exited before arming",
            ))),
        }
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.task.abort();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
        }
    }
}
