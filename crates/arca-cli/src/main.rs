//! arca: backup archive key and recovery CLI
//!
//! Key commands:
//!   key new                       - generate a fresh secret and print its 24 words
//!   key check [--validation]      - verify a phrase's checksum
//!   key hex [--raw] [--extra X]   - print the full key (or the raw key) as hex
//!   key v2-check                  - transcription diagnostic for unverified phrases
//!   password [--extra X]          - derive a service password
//!   port [--extra X]              - derive a service port
//!
//! Archive commands:
//!   decrypt <dir>                 - decrypt every file in a directory in place
//!   list-files                    - list path entries of every snapshot
//!   list-datas                    - list data blobs and their block ids
//!   get-data <dst>                - reassemble every complete data blob
//!   config show                   - display current configuration
//!
//! The phrase is read from `ARCA_MNEMONIC` or prompted for without echo.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use arca_blocks::{BlockLayout, LocalStore, ProgressFn};
use arca_core::{ArcaConfig, ArcaError};
use arca_crypto::{
    encode_password, encode_port, v2_checksum, validation_hash, Decoded, Dictionary, KeyMaterial,
    Mnemonic, Secret,
};

const MNEMONIC_ENV: &str = "ARCA_MNEMONIC";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "arca",
    version,
    about = "Backup archive key and recovery tool",
    long_about = "arca: manage the 24-word archive key, derive service credentials, and recover data from meta and block files"
)]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "ARCA_CONFIG",
        default_value = "~/.config/arca/config.toml"
    )]
    config: PathBuf,

    /// Log filter (overrides config; RUST_LOG wins over both)
    #[arg(long, env = "ARCA_LOG")]
    log: Option<String>,

    /// Log format (overrides config)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mnemonic and key inspection
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Derive a service password from the key
    Password {
        /// Free text appended to the key before derivation
        #[arg(long, short = 'e', default_value = "")]
        extra: String,
        /// Password length (default: from config)
        #[arg(long, short = 'l')]
        length: Option<usize>,
    },

    /// Derive a service port in [10000, 20000) from the key
    Port {
        /// Free text appended to the key before derivation
        #[arg(long, short = 'e', default_value = "")]
        extra: String,
    },

    /// Decrypt every file in a directory in place
    ///
    /// Already decrypted files are skipped, so the command can be re-run.
    /// Stops at the first file that fails to decrypt.
    Decrypt {
        /// Directory of encrypted meta or block files
        dir: PathBuf,
    },

    /// List the path entries of every snapshot
    #[command(name = "list-files")]
    ListFiles {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// List the data blobs of every snapshot with their block ids
    #[command(name = "list-datas")]
    ListDatas {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Reassemble every data blob whose blocks are all present
    #[command(name = "get-data")]
    GetData {
        /// Destination directory; files are named by data hash
        dst: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Generate a random secret and print its phrase
    New {
        /// Also print the secret as hex
        #[arg(long)]
        hex: bool,
    },

    /// Verify a phrase's checksum
    Check {
        /// Print the 4-byte validation fingerprint
        #[arg(long)]
        validation: bool,
    },

    /// Print the full key, SHA-256(secret ‖ extra), as hex
    Hex {
        /// Print the decoded secret itself instead
        #[arg(long)]
        raw: bool,
        #[arg(long, short = 'e', default_value = "")]
        extra: String,
    },

    /// Print the v2 checksum of the phrase's unverified payload
    #[command(name = "v2-check")]
    V2Check,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Display current configuration
    Show,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Metadata directory (default: from config)
    #[arg(long)]
    meta_dir: Option<PathBuf>,
    /// Block directory (default: from config)
    #[arg(long)]
    block_dir: Option<PathBuf>,
    /// Block files sit directly in the block directory
    #[arg(long)]
    flat: bool,
    /// Read the key so still-encrypted files can be opened
    #[arg(long)]
    with_key: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = ArcaConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let level = cli.log.as_deref().unwrap_or(&config.logging.level);
    let format = cli.log_format.clone().unwrap_or(match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(level, &format);
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        found = config_path.exists(),
        "arca starting"
    );
    if let Some(path) = &config.key.dictionary {
        load_dictionary(&expand_tilde(path))?;
    }

    match cli.command {
        Commands::Key { action } => match action {
            KeyAction::New { hex } => cmd_key_new(hex),
            KeyAction::Check { validation } => cmd_key_check(&config, validation),
            KeyAction::Hex { raw, extra } => cmd_key_hex(raw, &extra),
            KeyAction::V2Check => cmd_key_v2_check(),
        },
        Commands::Password { extra, length } => cmd_password(&config, &extra, length),
        Commands::Port { extra } => cmd_port(&config, &extra),
        Commands::Decrypt { dir } => cmd_decrypt(&config, &dir),
        Commands::ListFiles { store } => cmd_list(&config, &store, ListKind::Files),
        Commands::ListDatas { store } => cmd_list(&config, &store, ListKind::Datas),
        Commands::GetData { dst, store } => cmd_get_data(&config, &store, &dst),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Replace the embedded English list before any phrase is read or printed.
fn load_dictionary(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading dictionary {}", path.display()))?;
    let dict = Dictionary::from_lines(&text)
        .with_context(|| format!("invalid dictionary {}", path.display()))?;
    Dictionary::install(dict)?;
    info!(path = %path.display(), "dictionary loaded");
    Ok(())
}

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

fn read_phrase() -> Result<SecretString> {
    if let Ok(phrase) = std::env::var(MNEMONIC_ENV) {
        debug!("mnemonic taken from {MNEMONIC_ENV}");
        return Ok(SecretString::from(phrase));
    }
    let phrase = rpassword::prompt_password("Mnemonic (24 words or 64 hex): ")
        .context("reading mnemonic from terminal")?;
    Ok(SecretString::from(phrase))
}

fn read_mnemonic() -> Result<Mnemonic> {
    let phrase = read_phrase()?;
    Ok(Mnemonic::parse(phrase.expose_secret())?)
}

/// The decoded secret, refusing phrases whose checksum does not match.
fn read_secret() -> Result<Secret> {
    match read_mnemonic()?.decode() {
        Decoded::Key(secret) => Ok(secret),
        Decoded::ChecksumMismatch => bail!("mnemonic checksum mismatch: check the words for typos"),
    }
}

/// The key handed to decryption and derivation.
fn working_key(config: &ArcaConfig) -> Result<Secret> {
    Ok(stretch_for(config, read_secret()?))
}

fn stretch_for(config: &ArcaConfig, secret: Secret) -> Secret {
    if config.key.stretch {
        secret.stretched()
    } else {
        secret
    }
}

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_callback(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, item| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(item.to_string());
    })
}

/// Attach a hint to failures that mean "wrong key or damaged file".
fn explain(err: ArcaError) -> anyhow::Error {
    match err {
        ArcaError::Integrity(_) => {
            anyhow::Error::new(err).context("verification failed (wrong key or corrupted file)")
        }
        other => other.into(),
    }
}

fn open_store(config: &ArcaConfig, args: &StoreArgs) -> Result<LocalStore> {
    let mut store = LocalStore::from_config(&config.store);
    if args.meta_dir.is_some() || args.block_dir.is_some() {
        store = LocalStore::new(
            args.meta_dir.clone().unwrap_or_else(|| config.store.meta_dir.clone()),
            args.block_dir.clone().unwrap_or_else(|| config.store.block_dir.clone()),
        )
        .with_temp_name(&config.store.temp_name);
    }
    if args.flat || !config.store.sharded {
        store = store.with_layout(BlockLayout::Flat);
    }
    if args.with_key {
        store = store.with_key(KeyMaterial::from(&working_key(config)?));
    }
    Ok(store)
}

// ── `arca key` ────────────────────────────────────────────────────────────────

fn cmd_key_new(show_hex: bool) -> Result<()> {
    let secret = Secret::random();
    let mnemonic = Mnemonic::encode(&secret);
    println!("{}", mnemonic.to_grouped());
    if show_hex {
        println!();
        println!("{}", secret.to_hex());
    }
    Ok(())
}

fn cmd_key_check(config: &ArcaConfig, validation: bool) -> Result<()> {
    let secret = read_secret()?;
    println!("checksum: ok");
    if validation {
        println!("validation: {}", validation_hex(config, secret));
    }
    Ok(())
}

/// The fingerprint is taken over the working key, not the decoded secret.
fn validation_hex(config: &ArcaConfig, secret: Secret) -> String {
    hex::encode(validation_hash(&stretch_for(config, secret)))
}

fn cmd_key_hex(raw: bool, extra: &str) -> Result<()> {
    println!("{}", key_hex(&read_secret()?, raw, extra));
    Ok(())
}

/// Both forms start from the unstretched secret.
fn key_hex(secret: &Secret, raw: bool, extra: &str) -> String {
    if raw {
        secret.to_hex()
    } else {
        hex::encode(secret.full_key(extra.as_bytes()))
    }
}

fn cmd_key_v2_check() -> Result<()> {
    let mnemonic = read_mnemonic()?;
    let status = if mnemonic.decode().is_valid() {
        "ok"
    } else {
        "mismatch"
    };
    let payload = mnemonic.decode_unchecked();
    println!("checksum: {status}");
    println!("v2: {}", hex::encode(v2_checksum(payload.as_bytes())));
    Ok(())
}

// ── `arca password` / `arca port` ─────────────────────────────────────────────

fn cmd_password(config: &ArcaConfig, extra: &str, length: Option<usize>) -> Result<()> {
    let key = working_key(config)?;
    let material = key.with_extra(extra.as_bytes());
    let length = length.unwrap_or(config.key.password_length);
    if length == 0 {
        bail!("password length must be positive");
    }
    let password = encode_password(material.as_bytes(), length)?;
    println!("{}", password.expose_secret());
    Ok(())
}

fn cmd_port(config: &ArcaConfig, extra: &str) -> Result<()> {
    let key = working_key(config)?;
    let material = key.with_extra(extra.as_bytes());
    println!("{}", encode_port(material.as_bytes())?);
    Ok(())
}

// ── `arca decrypt` ────────────────────────────────────────────────────────────

fn cmd_decrypt(config: &ArcaConfig, dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }
    let material = KeyMaterial::from(&working_key(config)?);

    let pb = make_progress_bar(0, "decrypt");
    let cb = progress_callback(&pb);
    let result = arca_blocks::decrypt_dir(dir, material.as_bytes(), &config.store.temp_name, Some(&cb));
    pb.finish_and_clear();

    let report = result.map_err(|e| explain(e.into()))?;
    info!(
        decrypted = report.decrypted,
        skipped = report.already_decrypted,
        "decrypt done"
    );
    println!(
        "decrypted {} file(s), {} already decrypted",
        report.decrypted, report.already_decrypted
    );
    Ok(())
}

// ── `arca list-files` / `arca list-datas` ─────────────────────────────────────

enum ListKind {
    Files,
    Datas,
}

fn cmd_list(config: &ArcaConfig, args: &StoreArgs, kind: ListKind) -> Result<()> {
    let store = open_store(config, args)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = match kind {
        ListKind::Files => arca_blocks::list_files(&store, &mut out),
        ListKind::Datas => arca_blocks::list_datas(&store, &mut out),
    };
    result.map_err(|e| explain(e.into()))?;
    out.flush()?;
    Ok(())
}

// ── `arca get-data` ───────────────────────────────────────────────────────────

fn cmd_get_data(config: &ArcaConfig, args: &StoreArgs, dst: &Path) -> Result<()> {
    let store = open_store(config, args)?;

    let pb = make_progress_bar(0, "get-data");
    let cb = progress_callback(&pb);
    let result = arca_blocks::get_data(&store, dst, Some(&cb));
    pb.finish_and_clear();

    let report = result.map_err(|e| explain(e.into()))?;
    for missing in &report.incomplete {
        println!(
            "data {}: only {} of {} blocks found",
            missing.data, missing.available, missing.required
        );
    }
    println!(
        "wrote {} data file(s) ({} bytes), {} already present, {} incomplete",
        report.written,
        report.bytes,
        report.existing,
        report.incomplete.len()
    );
    Ok(())
}

// ── `arca config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &ArcaConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
