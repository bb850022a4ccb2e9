// Robot-side runtime: TCP frame intake, 50 Hz watchdog, optional telemetry
// Note: frames and watchdog ticks are handled on one control task, in arrival
// order, so the session never needs internal locking.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{Settings, FRAME_LEN, TOPIC_HEALTH, TOPIC_STEERING};
use crate::error::{Error, Result};
use crate::messages::{RuntimeHealth, SteeringReport};
use crate::motor::{spawn_sync_loop, Actuator, FeetechBase, MotorGate, SimActuator};
use crate::session::{FrameOutcome, Session};

pub type Frame = [u8; FRAME_LEN];

// Frames buffered between connection tasks and the control task
const FRAME_QUEUE: usize = 64;

/// Read fixed-size frames from one connection until EOF or an I/O error
pub async fn read_frames<R>(mut stream: R, frames: mpsc::Sender<Frame>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut frame = [0u8; FRAME_LEN];
        match stream.read_exact(&mut frame).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }
        if frames.send(frame).await.is_err() {
            // Control task is gone
            return Ok(());
        }
    }
}

async fn handle_connection(stream: TcpStream, frames: mpsc::Sender<Frame>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!("Handset connected: {}", peer);
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
    }
    match read_frames(stream, frames).await {
        Ok(()) => info!("Handset disconnected: {}", peer),
        Err(e) => warn!("Connection {} closed: {}", peer, e),
    }
}

async fn accept_loop(listener: TcpListener, frames: mpsc::Sender<Frame>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(handle_connection(stream, frames.clone()));
            }
            Err(e) => warn!("Accept failed: {}", e),
        }
    }
}

/// Zenoh publishers for steering reports and health
struct Telemetry {
    _session: zenoh::Session,
    steering: zenoh::pubsub::Publisher<'static>,
    health: zenoh::pubsub::Publisher<'static>,
}

impl Telemetry {
    async fn open() -> Result<Self> {
        info!("Opening Zenoh session...");
        let session = zenoh::open(zenoh::Config::default())
            .await
            .map_err(|e| Error::Telemetry(e.to_string()))?;
        let steering = session
            .declare_publisher(TOPIC_STEERING)
            .await
            .map_err(|e| Error::Telemetry(e.to_string()))?;
        let health = session
            .declare_publisher(TOPIC_HEALTH)
            .await
            .map_err(|e| Error::Telemetry(e.to_string()))?;
        info!("Publishing to: {}, {}", TOPIC_STEERING, TOPIC_HEALTH);
        Ok(Self {
            _session: session,
            steering,
            health,
        })
    }

    async fn publish_steering(&self, report: &SteeringReport) -> Result<()> {
        let json = serde_json::to_string(report)?;
        self.steering
            .put(json)
            .await
            .map_err(|e| Error::Telemetry(e.to_string()))
    }

    async fn publish_health(&self, health: RuntimeHealth) -> Result<()> {
        let json = serde_json::to_string(&health)?;
        self.health
            .put(json)
            .await
            .map_err(|e| Error::Telemetry(e.to_string()))
    }
}

/// Control loop: owns the session until ctrl-c
///
/// Timestamps come from the tokio clock; each watchdog check is stamped with
/// its scheduled deadline rather than the time it happened to run.
async fn control_loop<A: Actuator>(
    mut session: Session<A>,
    mut frames: mpsc::Receiver<Frame>,
    period: Duration,
    telemetry: Option<Telemetry>,
) -> Result<()> {
    // Burst keeps deadlines at start + n * period, so checks do not drift
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(frame) = frames.recv() => {
                let outcome = session.on_frame(&frame, Instant::now().into_std());
                if let (Some(telemetry), FrameOutcome::Drive { model_code, command }) =
                    (&telemetry, &outcome)
                {
                    let report = SteeringReport::new(*model_code, command);
                    if let Err(e) = telemetry.publish_steering(&report).await {
                        debug!("Steering report not published: {}", e);
                    }
                }
            }
            deadline = tick.tick() => {
                let health = session.on_tick(deadline.into_std());
                if let Some(telemetry) = &telemetry {
                    if let Err(e) = telemetry.publish_health(health).await {
                        debug!("Health not published: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    session.shutdown()
}

async fn serve<A: Actuator>(gate: MotorGate<A>, settings: &Settings) -> Result<()> {
    let mut session = Session::new(gate, settings.cmd_timeout(), Instant::now().into_std());
    session.start()?;

    let telemetry = if settings.telemetry {
        Some(Telemetry::open().await?)
    } else {
        None
    };

    let listener = TcpListener::bind(settings.listen).await?;
    let (frame_tx, frame_rx) = mpsc::channel(FRAME_QUEUE);
    let acceptor = tokio::spawn(accept_loop(listener, frame_tx));

    info!(
        "Runtime started: listening on {}, {}ms watchdog every {}ms",
        settings.listen,
        settings.timeout_ms,
        settings.period_ms
    );

    let result = control_loop(session, frame_rx, settings.watchdog_period(), telemetry).await;
    acceptor.abort();
    result
}

pub async fn run(settings: Settings) -> Result<()> {
    if settings.sim {
        info!("Using simulated base");
        serve(MotorGate::new(SimActuator::new()), &settings).await
    } else {
        let gate = MotorGate::new(FeetechBase::open(&settings.motor_port)?);
        let sync_loop = spawn_sync_loop(&gate);
        let result = serve(gate, &settings).await;
        // The gate is released by now, which ends the sync loop and drops the base
        match tokio::task::spawn_blocking(move || sync_loop.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => warn!("Motor sync loop panicked"),
            Err(e) => warn!("Could not join motor sync loop: {}", e),
        }
        result
    }
}
