// Keyboard handset: W/S tilt forward/back, A/D tilt left/right, 0-9 pick model,
// M adds 10 to the model code, space toggles drive/stop, Q quits
//
// Usage: cargo run --example tilt_teleop -- [robot address]
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tilt_drive_runtime::frame::{encode, ControlSample};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::info;

const GRAVITY: f32 = 9.81;
const TILT_STEP_DEG: f32 = 10.0;
const MAX_TILT_DEG: f32 = 80.0;
const INPUT_TIMEOUT_MS: u64 = 300; // Level the handset after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:1024".to_string());
    info!("Connecting to {}...", addr);
    let mut stream = TcpStream::connect(&addr).await?;
    stream.set_nodelay(true)?;

    info!("Controls: WASD=tilt, 0-9/M=model, SPACE=drive/stop, Q=quit");
    info!("Stopped, model 0");

    enable_raw_mode()?;
    let result = run_teleop(&mut stream).await;
    disable_raw_mode()?;

    result
}

/// Gravity vector of a handset pitched by `pitch` and rolled by `roll` degrees
fn gravity(pitch: f32, roll: f32) -> (f32, f32, f32) {
    let (pitch, roll) = (pitch.to_radians(), roll.to_radians());
    let x = GRAVITY * pitch.sin();
    let y = GRAVITY * pitch.cos() * roll.sin();
    let z = GRAVITY * pitch.cos() * roll.cos();
    (x, y, z)
}

async fn run_teleop(
    stream: &mut TcpStream,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut drive = false;
    let mut model_code: u8 = 0;

    // Persistent tilt state
    let mut pitch = 0.0f32;
    let mut roll = 0.0f32;
    let mut last_tilt_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                match code {
                    KeyCode::Char('w') if pressed => {
                        pitch = (pitch + TILT_STEP_DEG).min(MAX_TILT_DEG);
                        last_tilt_input = Instant::now();
                    }
                    KeyCode::Char('s') if pressed => {
                        pitch = (pitch - TILT_STEP_DEG).max(-MAX_TILT_DEG);
                        last_tilt_input = Instant::now();
                    }
                    KeyCode::Char('a') if pressed => {
                        roll = (roll - TILT_STEP_DEG).max(-MAX_TILT_DEG);
                        last_tilt_input = Instant::now();
                    }
                    KeyCode::Char('d') if pressed => {
                        roll = (roll + TILT_STEP_DEG).min(MAX_TILT_DEG);
                        last_tilt_input = Instant::now();
                    }

                    KeyCode::Char(c @ '0'..='9') if pressed => {
                        model_code = c as u8 - b'0';
                        info!("Model {}", model_code);
                    }
                    KeyCode::Char('m') if pressed => {
                        model_code = model_code.saturating_add(10);
                        info!("Model {}", model_code);
                    }

                    KeyCode::Char(' ') if pressed => {
                        drive = !drive;
                        info!("{}", if drive { "Driving" } else { "Stopped" });
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Level the handset if no tilt input for INPUT_TIMEOUT_MS
        if last_tilt_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            pitch = 0.0;
            roll = 0.0;
        }

        // Always send at ~50Hz
        let (x, y, z) = gravity(pitch, roll);
        let frame = encode(&ControlSample {
            drive,
            model_code,
            x,
            y,
            z,
        });
        stream.write_all(&frame).await?;
    }

    // Leave the robot stopped
    let (x, y, z) = gravity(0.0, 0.0);
    let frame = encode(&ControlSample {
        drive: false,
        model_code,
        x,
        y,
        z,
    });
    stream.write_all(&frame).await?;
    Ok(())
}
