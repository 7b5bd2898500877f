use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use url::Url;

use signova::{
    CaptureController, ChannelRecognizer, Config, DisplayState, GifOutcome, PredictOutcome,
    RecognizerHandle, SpeechRecognizer, StillCamera,
};

/// Signova - capture hand signs and ask a prediction service what they mean
#[derive(Parser)]
#[command(name = "signova", version, about)]
struct Cli {
    /// Prediction service base URL
    #[arg(long, env = "SIGNOVA_SERVER_URL")]
    server: Option<Url>,

    /// Image file or directory used as the camera
    #[arg(long, env = "SIGNOVA_FRAMES")]
    frames: Option<PathBuf>,

    /// Disable voice commands
    #[arg(long)]
    disable_voice: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive session reading commands from stdin (default)
    Run,
    /// Upload an image and print the predicted gesture
    Predict {
        /// Image file
        path: PathBuf,
    },
    /// Print the GIF for a phrase
    Gif {
        /// Phrase to look up
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,signova=info",
        1 => "info,signova=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::load()?;
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }
    if let Some(frames) = cli.frames {
        config.camera.frames = Some(frames);
    }
    if cli.disable_voice {
        config.voice.enabled = false;
    }
    tracing::debug!(?config, "loaded configuration");

    let camera = Arc::new(StillCamera::from_path(
        config.camera.frames.clone().unwrap_or_else(|| PathBuf::from("frames")),
    ));

    match cli.command.unwrap_or(Command::Run) {
        Command::Predict { path } => {
            let controller = CaptureController::new(config, camera, None)?;
            let outcome = controller.upload_path(&path).await?;
            Ok(report_prediction(&outcome))
        }
        Command::Gif { text } => {
            let controller = CaptureController::new(config, camera, None)?;
            match controller.lookup_gif(&text).await {
                GifOutcome::Found(gif) => {
                    println!("{gif}");
                    Ok(ExitCode::SUCCESS)
                }
                GifOutcome::Skipped => {
                    eprintln!("nothing to look up");
                    Ok(ExitCode::FAILURE)
                }
                GifOutcome::NotFound => {
                    eprintln!("no GIF for {text:?}");
                    Ok(ExitCode::FAILURE)
                }
                GifOutcome::Failed(e) => {
                    eprintln!("GIF lookup failed: {e}");
                    Ok(ExitCode::FAILURE)
                }
                GifOutcome::Cancelled => Ok(ExitCode::FAILURE),
            }
        }
        Command::Run => interactive(config, camera).await,
    }
}

fn report_prediction(outcome: &PredictOutcome) -> ExitCode {
    match outcome {
        PredictOutcome::Recognized(gesture) => {
            println!("{gesture}");
            ExitCode::SUCCESS
        }
        PredictOutcome::NotRecognized(message) | PredictOutcome::Failed(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
        PredictOutcome::Skipped(reason) => {
            eprintln!("prediction skipped: {reason:?}");
            ExitCode::FAILURE
        }
        PredictOutcome::Cancelled => ExitCode::FAILURE,
    }
}

async fn interactive(config: Config, camera: Arc<StillCamera>) -> anyhow::Result<ExitCode> {
    let (recognizer, speech) = if config.voice.enabled {
        let (recognizer, handle) = ChannelRecognizer::new();
        (
            Some(Arc::new(recognizer) as Arc<dyn SpeechRecognizer>),
            Some(handle),
        )
    } else {
        (None, None)
    };

    let controller = CaptureController::new(config, camera, recognizer)?;
    let printer = tokio::spawn(print_display(controller.subscribe()));

    if let Err(e) = controller.start_camera().await {
        tracing::warn!(error = %e, "continuing without camera");
    }
    if controller.start_voice_commands().await {
        tracing::info!("voice commands enabled - type `say <words>` to speak");
    }

    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if !handle_line(&controller, speech.as_ref(), line.trim()).await {
            break;
        }
    }

    controller.shutdown().await;
    printer.abort();
    Ok(ExitCode::SUCCESS)
}

/// Run one stdin command; returns false to quit
async fn handle_line(
    controller: &CaptureController,
    speech: Option<&RecognizerHandle>,
    line: &str,
) -> bool {
    let (command, arg) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(c, a)| (c, a.trim()));

    match command {
        "" => {}
        "capture" | "c" => {
            if let Err(e) = controller.capture_frame().await {
                eprintln!("capture failed: {e}");
            }
        }
        "predict" | "p" => {
            controller.predict_last().await;
        }
        "auto" | "a" => {
            controller.toggle_auto_capture().await;
        }
        "upload" | "u" => {
            if arg.is_empty() {
                eprintln!("usage: upload <path>");
            } else if let Err(e) = controller.upload_path(arg.as_ref()).await {
                eprintln!("upload failed: {e}");
            }
        }
        "gif" | "g" => {
            controller.lookup_gif(arg).await;
        }
        "say" | "s" => match speech {
            Some(handle) => handle.say(arg),
            None => eprintln!("voice commands are disabled"),
        },
        "status" => print_state(&controller.display()),
        "help" | "?" => print_help(),
        "quit" | "q" | "exit" => return false,
        other => eprintln!("unknown command: {other} (try `help`)"),
    }
    true
}

async fn print_display(mut rx: tokio::sync::watch::Receiver<DisplayState>) {
    let mut shown = rx.borrow_and_update().clone();
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        if state.status != shown.status && !state.status.is_empty() {
            println!("> {}", state.status);
        }
        if state.gesture != shown.gesture && !state.gesture.is_empty() {
            println!("  gesture: {}", state.gesture);
        }
        if state.gif != shown.gif {
            if state.gif.is_empty() {
                println!("  gif: (none)");
            } else {
                println!("  gif: {}", state.gif);
            }
        }
        shown = state;
    }
}

fn print_state(state: &DisplayState) {
    println!("status:  {}", state.status);
    println!("gesture: {}", state.gesture);
    println!("gif:     {}", if state.gif.is_empty() { "(none)" } else { state.gif.as_str() });
    println!(
        "preview: {}",
        state.preview.as_ref().map_or("(none)", |_| "available")
    );
    println!("auto:    [{}]", state.auto_label);
}

fn print_help() {
    println!("commands:");
    println!("  capture          capture a frame");
    println!("  predict          predict the last image");
    println!("  auto             toggle auto capture");
    println!("  upload <path>    predict an image file");
    println!("  gif <text>       show the GIF for a phrase");
    println!("  say <words>      speak to the voice listener");
    println!("  status           show the current display");
    println!("  quit");
}
