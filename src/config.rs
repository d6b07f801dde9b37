// src/config.rs  —  Runtime configuration for the demo binary (CLI + TOML)
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The example config is embedded directly in the binary at compile time.
/// Users can write it out with:  cw-keyer --write-config
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config.toml.example");

// ── CLI ───────────────────────────────────────────────────────────────────────
#[derive(Parser, Debug)]
#[command(
    name    = "cw-keyer",
    about   = "CW keyer and sidetone generator",
    version,
)]
pub struct Cli {
    /// Config file path (default: ~/.config/cw-keyer/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Text to send as Morse (words in <angle brackets> are prosigns)
    #[arg(long)]
    pub text: Option<String>,

    /// Sending speed in WPM
    #[arg(long)]
    pub wpm: Option<u32>,

    /// Sidetone frequency Hz
    #[arg(long)]
    pub tone: Option<u32>,

    /// Volume percent
    #[arg(long)]
    pub volume: Option<u32>,

    /// Farnsworth extra inter-character gap, in dots
    #[arg(long)]
    pub gap: Option<u32>,

    /// Mark/space weighting percent (50 = neutral)
    #[arg(long)]
    pub weighting: Option<u32>,

    /// Paddle mode: iambic_a | iambic_b | straight
    #[arg(long)]
    pub mode: Option<PaddleMode>,

    /// Audio backend: cpal | null
    #[arg(long)]
    pub backend: Option<String>,

    /// Render --text to a WAV file instead of playing it
    #[arg(long)]
    pub wav: Option<PathBuf>,

    /// Interactive paddle mode: '.'=dot paddle, '-'=dash paddle, Esc quits
    #[arg(long, action)]
    pub paddle: bool,

    /// Write the built-in default config.toml to the config path and exit.
    /// Use --config <PATH> to write to a custom location.
    #[arg(long, action)]
    pub write_config: bool,

    /// Print the built-in default config.toml to stdout and exit
    #[arg(long, action)]
    pub print_config: bool,
}

// ── Enums shared across CLI + TOML ────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum PaddleMode { IambicA, IambicB, Straight }

// ── TOML file structure ───────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    pub morse: Option<MorseCfg>,
    pub keyer: Option<KeyerCfg>,
    pub audio: Option<AudioCfg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorseCfg {
    pub wpm:       Option<u32>,
    pub tone_hz:   Option<u32>,
    pub volume:    Option<u32>,
    pub gap:       Option<u32>,
    pub weighting: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyerCfg {
    pub mode: Option<PaddleMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioCfg {
    pub backend: Option<String>,
}

// ── Resolved / merged config ──────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub wpm:       u32,
    pub tone_hz:   u32,
    pub volume:    u32,
    pub gap:       u32,
    pub weighting: u32,
    pub mode:      PaddleMode,
    pub backend:   String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            wpm:       12,
            tone_hz:   800,
            volume:    70,
            gap:       0,
            weighting: 50,
            mode:      PaddleMode::IambicA,
            backend:   "cpal".into(),
        }
    }
}

// ── Config loader ─────────────────────────────────────────────────────────────
impl AppConfig {
    /// Write the embedded default config to disk.
    /// Returns the path it was written to.
    pub fn write_default_config(cli: &Cli) -> Result<PathBuf> {
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating config directory {:?}", parent))?;
        }
        std::fs::write(&path, DEFAULT_CONFIG_TOML)
            .with_context(|| format!("Writing config to {:?}", path))?;
        Ok(path)
    }

    pub fn load(cli: &Cli) -> Result<Self> {
        let mut cfg = Self::default();

        // 1. Load TOML file
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Reading config {:?}", path))?;
            let fc: FileConfig = toml::from_str(&raw)
                .with_context(|| format!("Parsing config {:?}", path))?;
            cfg.apply_file(&fc);
        }

        // 2. Apply CLI overrides
        cfg.apply_cli(cli);
        Ok(cfg)
    }

    fn apply_file(&mut self, fc: &FileConfig) {
        if let Some(m) = &fc.morse {
            if let Some(v) = m.wpm       { self.wpm       = v; }
            if let Some(v) = m.tone_hz   { self.tone_hz   = v; }
            if let Some(v) = m.volume    { self.volume    = v; }
            if let Some(v) = m.gap       { self.gap       = v; }
            if let Some(v) = m.weighting { self.weighting = v; }
        }
        if let Some(k) = &fc.keyer {
            if let Some(v) = k.mode { self.mode = v; }
        }
        if let Some(a) = &fc.audio {
            if let Some(v) = &a.backend { self.backend = v.clone(); }
        }
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(v) = cli.wpm        { self.wpm       = v; }
        if let Some(v) = cli.tone       { self.tone_hz   = v; }
        if let Some(v) = cli.volume     { self.volume    = v; }
        if let Some(v) = cli.gap       { self.gap       = v; }
        if let Some(v) = cli.weighting  { self.weighting = v; }
        if let Some(v) = cli.mode       { self.mode      = v; }
        if let Some(v) = &cli.backend   { self.backend   = v.clone(); }
    }
}

fn default_config_path() -> PathBuf {
    config_dir().join("cw-keyer").join("config.toml")
}

fn config_dir() -> PathBuf {
    if let Ok(v) = std::env::var("XDG_CONFIG_HOME") { return PathBuf::from(v); }
    if let Ok(v) = std::env::var("APPDATA")          { return PathBuf::from(v); }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_default();
    PathBuf::from(home).join(".config")
}
