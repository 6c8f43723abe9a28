//! Server network layer: TCP accept loop and the simulation tick

use crate::dispatcher::run_dispatcher;
use crate::registry::{ConnectionId, Registry};
use crate::session::{handle_connection, SessionContext};
use crate::user_id::UserIdAllocator;
use log::{debug, error, info};
use shared::{UserId, DEFAULT_SPEED, FIRST_USER_ID};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Tunables for a [`Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Period of the simulation tick (~60 Hz by default)
    pub tick_interval: Duration,
    /// First user id issued; the counter wraps back here after `u16::MAX`
    pub first_user_id: UserId,
    /// Speed used when a Move command carries none
    pub default_speed: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
            first_user_id: FIRST_USER_ID,
            default_speed: DEFAULT_SPEED,
        }
    }
}

/// Cloneable handle for stopping a running [`Server`]
#[derive(Debug, Clone)]
pub struct ServerHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl ServerHandle {
    /// Requests shutdown. Safe to call any number of times.
    ///
    /// The accept loop exits and closes the listening socket; the tick
    /// stops. Sessions already running end on their next failed read.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Resolves once shutdown has been requested or every handle is gone.
async fn wait_for_stop(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Position synchronization server
pub struct Server {
    listener: TcpListener,
    registry: Arc<RwLock<Registry>>,
    user_ids: UserIdAllocator,
    config: ServerConfig,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (shutdown, _) = watch::channel(false);

        Ok(Server {
            listener,
            registry: Arc::new(RwLock::new(Registry::new())),
            user_ids: UserIdAllocator::new(config.first_user_id),
            config,
            shutdown: Arc::new(shutdown),
        })
    }

    /// Replaces the user id counter, e.g. to resume numbering at a given id.
    pub fn with_user_ids(mut self, user_ids: UserIdAllocator) -> Self {
        self.user_ids = user_ids;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    pub fn registry(&self) -> Arc<RwLock<Registry>> {
        Arc::clone(&self.registry)
    }

    /// Runs the accept loop until [`ServerHandle::stop`] is called.
    ///
    /// Spawns the dispatcher and the simulation tick, then spawns one
    /// session task per accepted connection. Never waits on session work.
    pub async fn run(self) -> io::Result<()> {
        let addr = self.listener.local_addr()?;
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_dispatcher(Arc::clone(&self.registry), dispatch_rx));
        tokio::spawn(run_simulation_tick(
            Arc::clone(&self.registry),
            self.config.tick_interval,
            self.shutdown.subscribe(),
        ));

        let ctx = SessionContext {
            registry: Arc::clone(&self.registry),
            dispatch: dispatch_tx,
            default_speed: self.config.default_speed,
        };
        let mut shutdown = self.shutdown.subscribe();

        info!("Server listening on {}", addr);

        loop {
            tokio::select! {
                _ = wait_for_stop(&mut shutdown) => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let id = ConnectionId::new();
                        let user_id = self.user_ids.allocate();
                        tokio::spawn(handle_connection(stream, peer, id, user_id, ctx.clone()));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
            }
        }

        drop(self.listener);
        info!("Server on {} stopped", addr);
        Ok(())
    }
}

/// Advances every registered character to the current time.
///
/// Returns the number of characters visited.
pub async fn advance_characters(registry: &RwLock<Registry>) -> usize {
    let characters = registry.read().await.snapshot();
    let now = Instant::now();
    for (_, character) in &characters {
        character.lock().await.update(now);
    }
    characters.len()
}

/// Fixed-period tick keeping server-side positions current between Move
/// commands. It never broadcasts.
pub async fn run_simulation_tick(
    registry: Arc<RwLock<Registry>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = wait_for_stop(&mut shutdown) => break,
            _ = ticker.tick() => {
                let count = advance_characters(&registry).await;
                ticks += 1;
                if ticks % 600 == 0 && count > 0 {
                    debug!("Tick {}: {} characters", ticks, count);
                }
            }
        }
    }
    debug!("Simulation tick stopped after {} ticks", ticks);
}
