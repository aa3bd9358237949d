//! chatlog-forge - game chat log formatter
//!
//! Turns pasted chat transcripts into colored HTML and PNG screenshots,
//! optionally composited over a background image.

use anyhow::{bail, Context, Result};
use chatlog_forge::core::Session;
use chatlog_forge::dom::WordId;
use chatlog_forge::events::{Modifiers, Point, PointerEvent, Target};
use chatlog_forge::{clipboard, config, linebreak, overlay, store};
use clap::{Parser as ClapParser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant, SystemTime};

#[derive(ClapParser)]
#[command(name = "chatlog-forge")]
#[command(about = "Format game chat logs into colored HTML and PNG screenshots", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Your character's name (their speech gets the brighter shade)
    #[arg(long)]
    character: Option<String>,

    /// Maximum characters per output line
    #[arg(long, value_name = "N")]
    line_length: Option<usize>,

    /// Font size in pixels
    #[arg(long, value_name = "PX")]
    font_size: Option<f32>,

    /// Hide money amounts, item counts and ids
    #[arg(long)]
    censor: bool,

    /// Give every speaker the same shade
    #[arg(long)]
    no_name_colors: bool,

    /// Custom data directory (default: ~/.chatlog-forge)
    /// Can also be set via CHATLOG_FORGE_DIR environment variable
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format a transcript to HTML
    Format {
        /// Transcript file ("-" or omitted reads stdin)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Read the transcript from the clipboard instead
        #[arg(long, conflicts_with = "input")]
        paste: bool,

        /// Write a standalone HTML page here instead of printing the fragment
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Copy the result to the clipboard
        #[arg(long)]
        copy: bool,

        /// Keep running and reformat whenever the input file changes
        #[arg(long, requires = "input", requires = "out")]
        watch: bool,
    },

    /// Render a transcript to a PNG image
    Export {
        /// Transcript file ("-" or omitted reads stdin)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Output file (default: chatlog-<timestamp>.png)
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Background image (PNG, JPEG or WebP)
        #[arg(long, value_name = "FILE")]
        background: Option<PathBuf>,

        /// Background pan in preview pixels, as X,Y
        #[arg(long, value_name = "X,Y", value_parser = parse_offset, allow_hyphen_values = true)]
        image_offset: Option<(f32, f32)>,

        /// Background zoom factor
        #[arg(long, value_name = "SCALE")]
        image_scale: Option<f32>,

        /// Chat pan in preview pixels, as X,Y
        #[arg(long, value_name = "X,Y", value_parser = parse_offset, allow_hyphen_values = true)]
        chat_offset: Option<(f32, f32)>,

        /// Chat zoom factor
        #[arg(long, value_name = "SCALE")]
        chat_scale: Option<f32>,

        /// Recolor words: BLOCK:WORD[-BLOCK:WORD]=CLASS (repeatable)
        #[arg(long, value_name = "RANGE=CLASS")]
        paint: Vec<PaintInstruction>,

        /// Image width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Image height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Resolution stored in the PNG
        #[arg(long)]
        dpi: Option<u32>,

        /// Leave the area behind the text transparent
        #[arg(long)]
        transparent: bool,

        /// Font file to render with
        #[arg(long, value_name = "FILE")]
        font: Option<PathBuf>,
    },

    /// Check a configuration file and report fixed values
    ValidateConfig {
        /// Config file to validate
        #[arg(value_name = "FILE")]
        config: Option<PathBuf>,

        /// Write the corrected values back to the file
        #[arg(long)]
        fix: bool,
    },
}

fn parse_offset(s: &str) -> Result<(f32, f32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", s))?;
    let x = x.trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<f32>().map_err(|e| e.to_string())?;
    Ok((x, y))
}

/// One `--paint` argument, replayed through the palette as a press on the
/// first word, a drag to the last and a release.
#[derive(Debug, Clone, PartialEq)]
struct PaintInstruction {
    from: WordId,
    to: WordId,
    class: String,
}

impl FromStr for PaintInstruction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (range, class) = s
            .rsplit_once('=')
            .ok_or_else(|| format!("expected RANGE=CLASS but got '{}'", s))?;
        let word = |w: &str| -> Result<WordId, String> {
            let (b, o) = w
                .trim()
                .split_once(':')
                .ok_or_else(|| format!("expected BLOCK:WORD but got '{}'", w))?;
            let b = b.parse::<usize>().map_err(|e| e.to_string())?;
            let o = o.parse::<usize>().map_err(|e| e.to_string())?;
            Ok(WordId::new(b, o))
        };
        let (from, to) = match range.split_once('-') {
            Some((a, b)) => (word(a)?, word(b)?),
            None => {
                let w = word(range)?;
                (w, w)
            }
        };
        let class = class.trim();
        if class.is_empty() {
            return Err("missing color class".to_string());
        }
        Ok(Self {
            from,
            to,
            class: class.to_string(),
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set custom data directory if specified (via CLI or environment variable)
    if let Some(data_dir) = &cli.data_dir {
        std::env::set_var("CHATLOG_FORGE_DIR", data_dir);
    }

    init_logging()?;
    if let Some(data_dir) = &cli.data_dir {
        tracing::info!("Using custom data directory: {:?}", data_dir);
    }

    if let Commands::ValidateConfig { config, fix } = &cli.command {
        return validate_config(config.as_deref(), *fix);
    }

    let mut config = match &cli.config {
        Some(path) => config::Config::load_from_path(path)?,
        None => config::Config::load()?,
    };
    apply_overrides(&cli, &mut config);

    let store_path = config::Config::store_path()?;
    let mut session = Session::new(&config, store::Store::open(store_path));
    if let Some(name) = cli.character.as_deref() {
        session.set_character_name(Some(name), Instant::now());
    }

    let result = match cli.command {
        Commands::Format {
            input,
            paste,
            out,
            copy,
            watch,
        } => {
            if watch {
                match (input, out) {
                    (Some(input), Some(out)) => watch_format(&mut session, &input, &out),
                    _ => bail!("--watch needs both an input file and --out"),
                }
            } else {
                let text = if paste {
                    clipboard::paste()?
                } else {
                    read_input(input.as_deref())?
                };
                run_format(&mut session, text, out.as_deref(), copy)
            }
        }
        Commands::Export {
            input,
            out,
            background,
            image_offset,
            image_scale,
            chat_offset,
            chat_scale,
            paint,
            width,
            height,
            dpi,
            transparent,
            font,
        } => {
            let mut settings = session.export_settings().clone();
            settings.width = width.unwrap_or(settings.width);
            settings.height = height.unwrap_or(settings.height);
            settings.dpi = dpi.unwrap_or(settings.dpi);
            if transparent {
                settings.black_background = false;
            }
            session.set_export_settings(settings);
            if font.is_some() {
                session.set_font_path(font);
            }

            let text = read_input(input.as_deref())?;
            session.set_input(text, Instant::now());
            session.reformat();

            if let Some(path) = background {
                if !session.load_background(&path) {
                    bail!(
                        "Background rejected: {}",
                        session.background_error().unwrap_or("unknown error")
                    );
                }
            }

            let overlay = session.overlay_mut();
            if let Some((x, y)) = image_offset {
                overlay.image.offset_x = x;
                overlay.image.offset_y = y;
            }
            if let Some(scale) = image_scale {
                overlay.image.scale = overlay::IMAGE_SCALE.clamp(scale);
            }
            if let Some((x, y)) = chat_offset {
                overlay.chat.offset_x = x;
                overlay.chat.offset_y = y;
            }
            if let Some(scale) = chat_scale {
                overlay.chat.scale = overlay::CHAT_SCALE.clamp(scale);
            }
            let requested = (overlay.image, overlay.chat);
            overlay.clamp_all();
            if (overlay.image, overlay.chat) != requested {
                tracing::warn!(
                    "offsets moved back into view: image {:?}, chat {:?}",
                    overlay.image,
                    overlay.chat
                );
                eprintln!("⚠ Offsets would push the content off the canvas and were clamped");
            }

            apply_paint(&mut session, &paint);
            run_export(&session, out)
        }
        Commands::ValidateConfig { .. } => Ok(()),
    };

    if let Err(e) = session.persist() {
        tracing::warn!("Failed to save store: {:#}", e);
    }
    result
}

fn init_logging() -> Result<()> {
    // Use RUST_LOG to control level, e.g. RUST_LOG=debug
    let log_path = config::Config::log_path()?;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create data directory")?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context(format!("Failed to open log file {:?}", log_path))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false) // No color codes in log file
        .init();
    Ok(())
}

fn apply_overrides(cli: &Cli, config: &mut config::Config) {
    if let Some(n) = cli.line_length {
        config.formatter.max_line_length = linebreak::clamp_line_length(n);
    }
    if let Some(px) = cli.font_size {
        if px.is_finite() && px > 0.0 {
            config.export.font_size = px;
        } else {
            tracing::warn!("ignoring invalid --font-size {}", px);
        }
    }
    if cli.censor {
        config.formatter.censor = true;
    }
    if cli.no_name_colors {
        config.formatter.name_coloring_disabled = true;
    }
}

fn validate_config(path: Option<&Path>, fix: bool) -> Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config::Config::config_path()?,
    };
    println!("Validating config file: {:?}", path);

    let contents = std::fs::read_to_string(&path).context(format!("Failed to read {:?}", path))?;
    let mut config: config::Config = match toml::from_str(&contents) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("✗ Failed to parse config: {}", e);
            std::process::exit(1);
        }
    };

    let fixed = config.normalize();
    if fixed == 0 {
        println!("✓ Config is valid with no issues");
    } else if fix {
        config.save_to(&path)?;
        println!("✓ {} invalid value(s) replaced with defaults and saved", fixed);
    } else {
        println!("⚠ {} value(s) invalid and replaced with defaults (see log)", fixed);
        println!("  Run again with --fix to write the corrected config");
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            std::fs::read_to_string(p).context(format!("Failed to read transcript {:?}", p))
        }
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read transcript from stdin")?;
            Ok(text)
        }
    }
}

fn run_format(session: &mut Session, text: String, out: Option<&Path>, copy: bool) -> Result<()> {
    session.set_input(text, Instant::now());
    session.reformat();

    match out {
        Some(path) => {
            std::fs::write(path, session.html_page()).context(format!("Failed to write {:?}", path))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", session.html_fragment()),
    }

    if copy {
        clipboard::copy_html(&session.html_fragment(), &session.plain_text())?;
        eprintln!("Copied to clipboard");
    }
    Ok(())
}

/// Poll `input` for changes and rewrite `out` after each settled edit.
fn watch_format(session: &mut Session, input: &Path, out: &Path) -> Result<()> {
    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    let modified = |p: &Path| -> Option<SystemTime> { std::fs::metadata(p).and_then(|m| m.modified()).ok() };
    let mut last_seen: Option<SystemTime> = None;
    eprintln!("Watching {} (Ctrl+C to stop)", input.display());

    loop {
        let now = Instant::now();
        let stamp = modified(input);
        if stamp != last_seen {
            last_seen = stamp;
            match std::fs::read_to_string(input) {
                Ok(text) => session.set_input(text, now),
                Err(e) => tracing::warn!("Failed to read {:?}: {}", input, e),
            }
        }

        if session.poll(now) {
            std::fs::write(out, session.html_page()).context(format!("Failed to write {:?}", out))?;
            tracing::info!("rewrote {:?} ({} blocks)", out, session.document().blocks.len());
            eprintln!("Updated {}", out.display());
        }

        let wait = session
            .next_deadline(now)
            .map(|d| d.saturating_duration_since(now))
            .unwrap_or(POLL_INTERVAL)
            .min(POLL_INTERVAL);
        std::thread::sleep(wait);
    }
}

/// Replay paint instructions as coloring-mode gestures.
fn apply_paint(session: &mut Session, paint: &[PaintInstruction]) {
    if paint.is_empty() {
        return;
    }
    session.set_coloring_mode(true);
    for p in paint {
        if !session.stylesheet().is_color_class(&p.class) {
            let names: Vec<&str> = session.stylesheet().palette().into_iter().map(|(n, _)| n).collect();
            eprintln!(
                "⚠ --paint {:?}: unknown color; use hex-RRGGBB or one of: {}",
                p.class,
                names.join(", ")
            );
            continue;
        }
        // Synthetic positions far enough apart to count as a drag
        let start = Point::new(0.0, 0.0);
        let end = Point::new(100.0, 0.0);
        session.handle_pointer(PointerEvent::Down {
            pos: start,
            target: Target::Word(p.from),
            modifiers: Modifiers::NONE,
        });
        if p.to != p.from {
            session.handle_pointer(PointerEvent::Move {
                pos: end,
                target: Target::Word(p.to),
            });
        }
        session.handle_pointer(PointerEvent::Up { pos: end });

        let changed = session.apply_color(&p.class);
        if changed == 0 {
            eprintln!("⚠ --paint {:?}: no words recolored (unknown word)", p.class);
        }
    }
    session.set_coloring_mode(false);
}

fn default_export_name() -> PathBuf {
    PathBuf::from(chrono::Local::now().format("chatlog-%Y%m%d-%H%M%S.png").to_string())
}

fn run_export(session: &Session, out: Option<PathBuf>) -> Result<()> {
    let png = session.export_png().context("Export failed")?;
    let path = out.unwrap_or_else(default_export_name);
    std::fs::write(&path, &png).context(format!("Failed to write {:?}", path))?;
    println!("Wrote {} ({} bytes)", path.display(), png.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("10,-5.5"), Ok((10.0, -5.5)));
        assert!(parse_offset("10").is_err());
        assert!(parse_offset("a,b").is_err());
    }

    #[test]
    fn test_paint_instruction_parses_ranges() {
        let p: PaintInstruction = "0:2-1:0=orange".parse().expect("parse");
        assert_eq!(p.from, WordId::new(0, 2));
        assert_eq!(p.to, WordId::new(1, 0));
        assert_eq!(p.class, "orange");

        let single: PaintInstruction = "3:4=hex-ff00ff".parse().expect("parse");
        assert_eq!(single.from, single.to);
        assert!("0:1".parse::<PaintInstruction>().is_err());
        assert!("0:1=".parse::<PaintInstruction>().is_err());
    }

    #[test]
    fn test_paint_recolors_range_in_session() {
        let mut session = Session::new(&config::Config::default(), store::Store::empty("unused.json"));
        session.set_input("one two three four", Instant::now());
        session.reformat();

        let p: PaintInstruction = "0:1-0:2=orange".parse().expect("parse");
        apply_paint(&mut session, &[p]);

        let sheet = session.stylesheet();
        let doc = session.document();
        assert_eq!(doc.word_color(WordId::new(0, 1), sheet), sheet.class_color("orange"));
        assert_eq!(doc.word_color(WordId::new(0, 2), sheet), sheet.class_color("orange"));
        assert_ne!(doc.word_color(WordId::new(0, 0), sheet), sheet.class_color("orange"));
        assert!(!session.palette().is_active());
    }

    #[test]
    fn test_paint_skips_unknown_class() {
        let mut session = Session::new(&config::Config::default(), store::Store::empty("unused.json"));
        session.set_input("one two", Instant::now());
        session.reformat();
        let before = session.html_fragment();

        let p: PaintInstruction = "0:0=chartreuse".parse().expect("parse");
        apply_paint(&mut session, &[p]);
        assert_eq!(session.html_fragment(), before);
    }

    #[test]
    fn test_validate_config_fix_writes_normalized_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut bad = config::Config::default();
        bad.formatter.max_line_length = 1;
        bad.save_to(&path).expect("save");

        validate_config(Some(&path), false).expect("validate");
        let untouched: config::Config = toml::from_str(&std::fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(untouched.formatter.max_line_length, 1);

        validate_config(Some(&path), true).expect("validate");
        let fixed: config::Config = toml::from_str(&std::fs::read_to_string(&path).expect("read")).expect("parse");
        assert_ne!(fixed.formatter.max_line_length, 1);
    }

    #[test]
    fn test_cli_parses_export_options() {
        let cli = Cli::try_parse_from([
            "chatlog-forge",
            "--censor",
            "export",
            "log.txt",
            "--chat-offset",
            "-5,10",
            "--paint",
            "0:0=green",
        ])
        .expect("parse");
        assert!(cli.censor);
        match cli.command {
            Commands::Export {
                chat_offset, paint, ..
            } => {
                assert_eq!(chat_offset, Some((-5.0, 10.0)));
                assert_eq!(paint.len(), 1);
            }
            _ => panic!("expected export"),
        }
    }
}
