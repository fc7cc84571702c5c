//! Subcommand handlers.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::oneshot;

use super::args::{Args, Command, ConfigAction};
use crate::camera::{CameraDevice, MockCamera};
use crate::config::{Config, DEFAULT_CONFIG, default_path};
use crate::enroll::{DEFAULT_BACKOFF_BASE, EnrollClient, reports_to_csv};
use crate::frame::CaptureBatch;
use crate::notify::LogSink;
use crate::sequencer::CaptureSequencer;

type CliResult = Result<(), Box<dyn Error>>;

/// Dispatch a parsed command line.
pub async fn run(args: Args) -> CliResult {
    let mut config = Config::load(args.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());

    match args.command {
        Command::ListCameras => list_cameras(args.mock),
        Command::Capture { count, out } => {
            let batch = capture_once(&config, args.mock, count).await?;
            let paths = batch.write_jpegs(&out)?;
            println!(
                "Saved {}/{} frames to {}",
                paths.len(),
                batch.requested(),
                out.display()
            );
            Ok(())
        }
        Command::Register {
            name,
            reg_id,
            count,
        } => {
            let batch = capture_once(&config, args.mock, count).await?;
            let reply = client(&config)?.register(&name, &reg_id, &batch).await?;
            println!("{}", reply.message);
            Ok(())
        }
        Command::Login { reg_id } => {
            let body = client(&config)?.login(&reg_id).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Command::Reports { csv } => {
            let reports = client(&config)?.student_reports().await?;
            if reports.is_empty() {
                println!("No reports available");
            } else {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
            if let Some(path) = csv {
                std::fs::write(&path, reports_to_csv(&reports))?;
                println!("Wrote {} reports to {}", reports.len(), path.display());
            }
            Ok(())
        }
        Command::Students => {
            let students = client(&config)?.current_students().await?;
            println!("{}", serde_json::to_string_pretty(&students)?);
            Ok(())
        }
        Command::Status { reg_id } => {
            let status = client(&config)?.monitoring_status(&reg_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::DeleteAll { yes } => {
            if !yes {
                return Err("Refusing to delete all student data without --yes".into());
            }
            let reply = client(&config)?.delete_all_students().await?;
            println!("{}", reply.message);
            Ok(())
        }
        Command::Config { action } => handle_config_action(action, &config, args.config.as_deref()),
    }
}

fn open_device(mock: bool) -> Arc<dyn CameraDevice> {
    #[cfg(feature = "webcam")]
    if !mock {
        return Arc::new(crate::camera::WebcamDevice);
    }
    if !mock {
        log::warn!("Built without the `webcam` feature, falling back to the mock camera");
    }
    Arc::new(MockCamera::new())
}

fn client(config: &Config) -> Result<EnrollClient, Box<dyn Error>> {
    let client = EnrollClient::with_timeout(config.backend.base_url.clone(), config.backend_timeout())?
        .with_retry(config.backend.max_retries, DEFAULT_BACKOFF_BASE);
    Ok(client)
}

/// Open the camera, capture one batch and release the camera again.
async fn capture_once(
    config: &Config,
    mock: bool,
    count: Option<u32>,
) -> Result<CaptureBatch, Box<dyn Error>> {
    capture_with(open_device(mock), config, count).await
}

async fn capture_with(
    device: Arc<dyn CameraDevice>,
    config: &Config,
    count: Option<u32>,
) -> Result<CaptureBatch, Box<dyn Error>> {
    let sequencer = CaptureSequencer::new(
        device,
        config.camera_settings(),
        config.capture_settings(),
        Arc::new(LogSink),
    );
    // Opening a real device blocks until its stream is running.
    let starter = sequencer.clone();
    tokio::task::spawn_blocking(move || starter.start_session()).await??;
    let count = count.unwrap_or(sequencer.capture_settings().count);

    let mut progress = sequencer.subscribe_progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let current = *progress.borrow_and_update();
            if current > 0 {
                eprintln!("Capturing {}/{}...", current, count);
            }
        }
    });

    let (tx, rx) = oneshot::channel();
    let result = sequencer
        .capture_batch(count, move |batch| {
            let _ = tx.send(batch);
        })
        .await;
    sequencer.stop_session();
    reporter.abort();

    result?;
    Ok(rx.await?)
}

/// List available cameras and print them to stdout.
fn list_cameras(mock: bool) -> CliResult {
    let devices = open_device(mock).devices()?;
    if devices.is_empty() {
        println!("No cameras found.");
        println!();
        println!("Make sure your camera is connected and permissions are granted.");
    } else {
        println!("Available cameras:");
        for device in devices {
            println!("  {}", device);
        }
        println!();
        println!("Set [camera] device in the config file to select a camera.");
    }
    Ok(())
}

/// Handle config subcommand actions.
fn handle_config_action(action: ConfigAction, config: &Config, custom: Option<&Path>) -> CliResult {
    let path = custom
        .map(Path::to_path_buf)
        .unwrap_or_else(default_path);

    match action {
        ConfigAction::Show => {
            println!("Current configuration:");
            println!();
            print!("{}", toml::to_string_pretty(config)?);
            println!();
            if path.exists() {
                println!("Config file: {} (exists)", path.display());
            } else {
                println!("Config file: {} (not found)", path.display());
            }
            Ok(())
        }
        ConfigAction::Init => {
            if path.exists() {
                return Err(format!("Config file already exists: {}", path.display()).into());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, DEFAULT_CONFIG)?;
            println!("Created config file: {}", path.display());
            Ok(())
        }
    }
}
