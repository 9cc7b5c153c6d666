use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use geo_assistant::config::Config;
use geo_assistant::location::LocationPoller;
use geo_assistant::server::{OpenAiCompleter, RelayServer};
use geo_assistant::session::{DispatchOutcome, Session, VoiceInputOutcome};
use geo_assistant::voice::{
    CaptureOutcome, ConsoleSpeaker, SpeechCapture, SpeechPlayback, UnavailableCapture,
    VoiceController,
};
use geo_assistant::{HttpAssistant, LocationProvider, Notices, PoiRegistry};

/// Geoassist - location-aware conversational assistant
#[derive(Parser)]
#[command(name = "geoassist", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Assistant backend endpoint (overrides config)
    #[arg(long)]
    backend: Option<String>,

    /// Disable voice input and spoken replies
    #[arg(long, env = "GEOASSIST_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive session (default)
    Chat,
    /// Ask a single question and print the reply
    Ask {
        /// Question text
        prompt: String,
        /// Do not attach the nearby place
        #[arg(long)]
        no_location: bool,
    },
    /// Fetch the current position once and show the nearby place
    Locate,
    /// List known places
    Pois,
    /// Run the assistant backend relay
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,geo_assistant=info",
        1 => "info,geo_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(backend) = cli.backend {
        config.backend_url = backend;
    }
    if cli.disable_voice {
        config.voice.enabled = false;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(&config).await,
        Command::Ask {
            prompt,
            no_location,
        } => ask(&config, &prompt, no_location).await,
        Command::Locate => locate(&config).await,
        Command::Pois => list_pois(&config),
        Command::Serve { port } => serve(&config, port).await,
    }
}

fn build_poller(config: &Config, notices: &Notices) -> anyhow::Result<Arc<LocationPoller>> {
    let registry = PoiRegistry::load_or_embedded(config.pois_path.as_deref())?;
    tracing::debug!(pois = registry.len(), "loaded POI registry");

    let provider = LocationProvider::new(config.location.build(), config.location_timeout);
    Ok(Arc::new(LocationPoller::new(
        provider,
        Arc::new(registry),
        config.poll_interval,
        notices.clone(),
    )))
}

fn build_session(config: &Config) -> anyhow::Result<Session> {
    let notices = Notices::new(config.notice_ttl);
    let poller = build_poller(config, &notices)?;
    let (capture, playback) = voice_adapters(config);
    let voice = VoiceController::new(capture, playback, notices.clone());
    let assistant = Arc::new(HttpAssistant::new(config.backend_url.clone()));

    Ok(Session::new(
        poller,
        voice,
        assistant,
        notices,
        config.preferences,
    ))
}

#[cfg(feature = "audio")]
fn voice_adapters(config: &Config) -> (Arc<dyn SpeechCapture>, Arc<dyn SpeechPlayback>) {
    use geo_assistant::voice::{MicrophoneCapture, SpeechToText, TextToSpeech, TtsSpeaker};

    let voice = &config.voice;
    if !voice.enabled {
        tracing::info!("voice disabled");
        return (
            Arc::new(UnavailableCapture::new("voice disabled")),
            Arc::new(ConsoleSpeaker),
        );
    }

    let stt_key = voice.stt_key(&config.api_keys).unwrap_or_default().to_string();
    let capture: Arc<dyn SpeechCapture> = match SpeechToText::for_model(stt_key, &voice.stt_model)
    {
        Ok(stt) => Arc::new(MicrophoneCapture::new(stt, voice.capture_window)),
        Err(e) => {
            tracing::warn!(error = %e, "voice input unavailable");
            Arc::new(UnavailableCapture::new(e.to_string()))
        }
    };

    let tts_key = voice.tts_key(&config.api_keys).unwrap_or_default().to_string();
    let playback: Arc<dyn SpeechPlayback> = match TextToSpeech::for_model(
        tts_key,
        &voice.tts_model,
        voice.tts_voice.clone(),
        voice.tts_speed,
    ) {
        Ok(tts) => Arc::new(TtsSpeaker::new(tts)),
        Err(e) => {
            tracing::warn!(error = %e, "spoken replies fall back to console");
            Arc::new(ConsoleSpeaker)
        }
    };

    (capture, playback)
}

#[cfg(not(feature = "audio"))]
fn voice_adapters(config: &Config) -> (Arc<dyn SpeechCapture>, Arc<dyn SpeechPlayback>) {
    let capture = if config.voice.enabled {
        UnavailableCapture::default()
    } else {
        UnavailableCapture::new("voice disabled")
    };
    (Arc::new(capture), Arc::new(ConsoleSpeaker))
}

/// Interactive session
async fn chat(config: &Config) -> anyhow::Result<()> {
    let session = Arc::new(build_session(config)?);
    spawn_watchers(&session);
    session.start();

    println!("geoassist ready. Type a question, /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit" | "/exit", _) => break,
            ("/help", _) => print_help(),
            ("/refresh", _) => match session.refresh_location().await {
                Ok(Some(place)) => println!("📍 near {place}"),
                Ok(None) => println!("📍 no known place nearby"),
                // Posted as a notice
                Err(_) => {}
            },
            ("/voice", _) => {
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    match session.start_voice_input().await {
                        VoiceInputOutcome::Dispatched {
                            transcript,
                            outcome,
                        } => {
                            println!("🎤 {transcript}");
                            print_outcome(outcome);
                        }
                        VoiceInputOutcome::NotDispatched(CaptureOutcome::AlreadyListening) => {
                            println!("already listening");
                        }
                        VoiceInputOutcome::NotDispatched(CaptureOutcome::Busy) => {
                            println!("still speaking, /stop first");
                        }
                        VoiceInputOutcome::NotDispatched(_) => {}
                    }
                });
            }
            ("/stop", _) => {
                if !session.stop_speaking() {
                    println!("nothing is being spoken");
                }
            }
            ("/context", arg) => match parse_toggle(arg) {
                Some(enabled) => session.set_use_location_context(enabled),
                None => println!("usage: /context on|off"),
            },
            ("/speak", arg) => match parse_toggle(arg) {
                Some(enabled) => session.set_auto_speak(enabled),
                None => println!("usage: /speak on|off"),
            },
            ("/status", _) => print_status(&session),
            _ if line.starts_with('/') => println!("unknown command, /help for commands"),
            _ => {
                session.set_input(line);
                print_outcome(session.submit().await);
            }
        }
    }

    session.shutdown();
    Ok(())
}

fn spawn_watchers(session: &Session) {
    let mut location = session.poller().subscribe();
    tokio::spawn(async move {
        let mut last_place = None;
        while location.changed().await.is_ok() {
            let snapshot = location.borrow_and_update().clone();
            if let Some(coordinate) = snapshot.location.coordinate {
                tracing::debug!(%coordinate, "location updated");
            }
            let place = snapshot.proximity.nearby;
            if place != last_place {
                match &place {
                    Some(name) => println!("📍 near {name}"),
                    None => println!("📍 left {}", last_place.as_deref().unwrap_or("")),
                }
                last_place = place;
            }
        }
    });

    let mut notices = session.notices().subscribe();
    tokio::spawn(async move {
        while notices.changed().await.is_ok() {
            if let Some(notice) = notices.borrow_and_update().clone() {
                println!("⚠ {notice}");
            }
        }
    });

    let mut voice = session.voice().subscribe();
    tokio::spawn(async move {
        while voice.changed().await.is_ok() {
            let state = *voice.borrow_and_update();
            println!("[voice: {state}]");
        }
    });
}

fn print_outcome(outcome: DispatchOutcome) {
    match outcome {
        DispatchOutcome::Answered(reply) => println!("{reply}"),
        DispatchOutcome::Blank | DispatchOutcome::Superseded | DispatchOutcome::Failed(_) => {}
    }
}

fn print_status(session: &Session) {
    let view = session.view();
    match view.coordinate {
        Some(coordinate) => println!("location: {coordinate}"),
        None => println!("location: unknown"),
    }
    if let Some(error) = view.location_error {
        println!("location error: {error}");
    }
    println!(
        "nearby:   {}",
        view.nearby_place.as_deref().unwrap_or("none")
    );
    println!("voice:    {}", view.voice);
    println!(
        "context:  {}",
        if view.preferences.use_location_context { "on" } else { "off" }
    );
    println!(
        "speak:    {}",
        if view.preferences.auto_speak { "on" } else { "off" }
    );
}

fn print_help() {
    println!("/refresh          fetch location now");
    println!("/voice            ask by voice");
    println!("/stop             stop speaking");
    println!("/context on|off   attach the nearby place to questions");
    println!("/speak on|off     speak replies aloud");
    println!("/status           show location and settings");
    println!("/quit             exit");
}

fn parse_toggle(arg: &str) -> Option<bool> {
    match arg.trim() {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// Ask one question
async fn ask(config: &Config, prompt: &str, no_location: bool) -> anyhow::Result<()> {
    let mut config = config.clone();
    config.preferences.auto_speak = false;
    config.preferences.use_location_context = !no_location;
    let session = build_session(&config)?;

    if !no_location {
        if let Err(e) = session.refresh_location().await {
            tracing::warn!(error = %e, "asking without location");
        }
    }

    match session.dispatch(prompt).await {
        DispatchOutcome::Answered(reply) => {
            println!("{reply}");
            Ok(())
        }
        DispatchOutcome::Failed(e) => Err(e.into()),
        DispatchOutcome::Blank => anyhow::bail!("prompt is empty"),
        DispatchOutcome::Superseded => Ok(()),
    }
}

/// Fetch the position once
async fn locate(config: &Config) -> anyhow::Result<()> {
    let notices = Notices::new(config.notice_ttl);
    let poller = build_poller(config, &notices)?;

    let proximity = poller.refresh_now().await?;
    if let Some(coordinate) = poller.location().coordinate {
        println!("location: {coordinate}");
    }
    println!("nearby:   {}", proximity.nearby().unwrap_or("none"));
    Ok(())
}

/// List known places
fn list_pois(config: &Config) -> anyhow::Result<()> {
    let registry = PoiRegistry::load_or_embedded(config.pois_path.as_deref())?;
    for poi in &registry {
        println!(
            "{:<24} {:>10.6} {:>10.6} {:>6.0} m",
            poi.name, poi.lat, poi.lon, poi.radius_m
        );
    }
    Ok(())
}

/// Run the relay
async fn serve(config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    let relay = &config.relay;
    let completer = OpenAiCompleter::new(
        relay.upstream_url.clone(),
        relay.model.clone(),
        relay.api_key.clone(),
    )
    .with_top_k(relay.send_top_k);
    let port = port.unwrap_or(relay.port);

    tracing::info!(port, upstream = %relay.upstream_url, model = %relay.model, "starting relay");
    RelayServer::new(port, Arc::new(completer)).run().await?;
    Ok(())
}
