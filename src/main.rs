use anyhow::Context as _;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use voicepad::config::Config;
use voicepad::provider::{HttpChatModel, HttpSpeechToText};
use voicepad::service::{ServiceBackend, TranscriptionService};
use voicepad::session::{DictationSession, SessionConfig, WavFileSource};
use voicepad::{db, session::AudioSource as _};

/// Dictate a WAV file through the live slicing path: cut, transcribe, merge,
/// apply the dictionary, and polish.
#[derive(Parser, Debug)]
#[command(name = "voicepad")]
struct Cli {
    /// 16-bit PCM WAV file to play back as live input
    input: PathBuf,

    /// Email of the user to record under (created on first use)
    #[arg(long, default_value = "demo@voicepad.local")]
    user: String,

    /// Override the slice interval in milliseconds
    #[arg(long)]
    slice_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(slice_ms) = cli.slice_ms {
        config.slice_interval = Duration::from_millis(slice_ms);
    }

    let pool = db::init_db(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    info!("Database initialized successfully");

    let stt = HttpSpeechToText::new(
        &config.stt.base_url,
        &config.stt.api_key,
        &config.stt.model,
        config.stt_language.clone(),
    )
    .context("Failed to build transcription client")?;
    let chat = HttpChatModel::new(&config.chat.base_url, &config.chat.api_key, &config.chat.model)
        .context("Failed to build chat client")?;

    let service = Arc::new(TranscriptionService::new(
        pool.clone(),
        Arc::new(stt),
        Arc::new(chat),
    ));

    let user = db::get_or_create_user(&pool, "Demo", &cli.user)
        .await
        .context("Failed to load user")?;
    info!("Recording as {} <{}>", user.name, user.email);

    let source = WavFileSource::open(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let clip_length = source.duration();
    info!(
        "Playing {} back as live input ({:.1}s at {} Hz)",
        cli.input.display(),
        clip_length.as_secs_f64(),
        source.sample_rate()
    );

    let backend = Arc::new(ServiceBackend::new(service, user.id));
    let mut session = DictationSession::new(
        backend,
        SessionConfig { slice_interval: config.slice_interval },
    );

    // Echo progressive results the way the recording screen would.
    let mut text_rx = session.subscribe_text();
    let printer = tokio::spawn(async move {
        while text_rx.changed().await.is_ok() {
            let text = text_rx.borrow_and_update().clone();
            if !text.is_empty() {
                println!("~ {}", text);
            }
        }
    });

    let mut phase_rx = session.subscribe_phase();
    let phase_log = tokio::spawn(async move {
        while phase_rx.changed().await.is_ok() {
            info!("session phase: {:?}", *phase_rx.borrow_and_update());
        }
    });

    session.start(source).await?;

    // Let the clip play out, then stop as a user would.
    tokio::time::sleep(clip_length + Duration::from_millis(500)).await;
    let final_text = session.stop().await?;

    printer.abort();
    phase_log.abort();

    match final_text {
        Some(text) => println!("{}", text),
        None => println!("{}", session.merged_text()),
    }

    Ok(())
}
