use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use vocafree_gateway::api::ApiServer;
use vocafree_gateway::voice::{AudioCapture, AudioInput, AudioPlayback, rms};
use vocafree_gateway::{Config, Session, TurnOutcome, providers};

/// VocaFree - push-to-talk voice assistant
#[derive(Parser)]
#[command(name = "vocafree", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "VOCAFREE_PORT")]
    port: Option<u16>,

    /// Config file (defaults to ~/.config/vocafree/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API and web UI (default)
    Serve,
    /// Talk from the terminal: Enter records, "reset" clears, "quit" exits
    Talk {
        /// Recording length in seconds
        #[arg(short, long, default_value = "5")]
        seconds: u64,
    },
    /// Transcribe an audio file
    Transcribe {
        /// Path to the audio file
        file: PathBuf,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,vocafree_gateway=info",
        1 => "info,vocafree_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Talk { seconds } => talk(&config, Duration::from_secs(seconds)).await,
        Command::Transcribe { file } => transcribe(&config, file).await,
        Command::TestTts { text } => test_tts(&config, &text).await,
        Command::TestMic { duration } => test_mic(duration).await,
    }
}

/// Run the HTTP server until interrupted
async fn serve(config: &Config) -> anyhow::Result<()> {
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        model = %config.llm.model,
        "starting vocafree gateway"
    );

    ApiServer::from_config(config).run().await?;
    Ok(())
}

/// Terminal push-to-talk loop
#[allow(clippy::future_not_send)]
async fn talk(config: &Config, seconds: Duration) -> anyhow::Result<()> {
    let processor = providers::build_processor(config);
    let mut session = Session::new(config.llm.system_prompt.clone());
    let mut capture = AudioCapture::new()?;
    let playback = AudioPlayback::new()?;

    println!("Press Enter to record {}s, type \"reset\" to start over, \"quit\" to exit.", seconds.as_secs());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let view = match line.trim() {
            "quit" | "exit" => break,
            "reset" => session.reset(),
            _ => {
                println!("Listening...");
                let audio = capture.record(seconds).await?;
                session.run_turn(&processor, Some(&audio)).await
            }
        };

        if matches!(view.outcome, TurnOutcome::Reset) {
            println!("(conversation cleared)");
        }
        if let Some(last) = view.transcript.last() {
            println!("{}: {}", last.role, last.content);
        }

        if let Some(clip) = session.take_audio() {
            if let Err(e) = playback.play_clip(&clip).await {
                tracing::warn!(error = %e, "playback failed");
            }
        }
    }

    Ok(())
}

/// Transcribe a single file with the configured backend
async fn transcribe(config: &Config, file: PathBuf) -> anyhow::Result<()> {
    let stt = providers::speech_to_text(config)?;
    let text = stt.transcribe_audio(&AudioInput::from_path(file)).await?;
    println!("{}", text.trim());
    Ok(())
}

/// Test TTS output
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = providers::text_to_speech(config)?;

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize_mp3(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    AudioPlayback::new()?.play_mp3(&mp3_data)?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check that the right input device is the default.");

    Ok(())
}
