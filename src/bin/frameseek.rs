use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use frameseek::{
    ChannelOrder, FfmpegBackend, FfmpegLogLevel, FfmpegSession, PixelBuffer, SessionOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  frameseek info input.mp4 --json\n  frameseek frame input.mp4 1200 --out frame.png\n  frameseek frame input.mp4 0:01:30 --out frame.png\n  frameseek keyframe input.mp4 1200 --out key.png\n  frameseek dump input.mp4 --out frames --every 10 --limit 50 --progress\n  frameseek completions zsh > _frameseek";

#[derive(Debug, Parser)]
#[command(
    name = "frameseek",
    version,
    about = "Read exact video frames by index or timecode",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Largest forward jump served by decoding instead of seeking.
    #[arg(long, global = true)]
    forward_threshold: Option<i64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print video track information.
    #[command(
        about = "Print video track information",
        visible_alias = "probe",
        after_help = "Examples:\n  frameseek info input.mp4\n  frameseek info input.mp4 --json"
    )]
    Info {
        /// Input media path.
        input: PathBuf,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Save one exact frame.
    #[command(
        about = "Save the frame at an index or timecode",
        after_help = "Examples:\n  frameseek frame input.mp4 250 --out frame.png\n  frameseek frame input.mp4 00:00:10.5 --out frame.jpg"
    )]
    Frame {
        /// Input media path.
        input: PathBuf,
        /// Frame index, or a timecode (SS, MM:SS or HH:MM:SS[.fff]).
        position: String,
        /// Output image path; the extension picks the format.
        #[arg(long)]
        out: PathBuf,
    },

    /// Save the keyframe at or before a position.
    #[command(
        about = "Save the nearest keyframe at or before an index or timecode",
        after_help = "Examples:\n  frameseek keyframe input.mp4 250 --out key.png"
    )]
    Keyframe {
        /// Input media path.
        input: PathBuf,
        /// Frame index, or a timecode (SS, MM:SS or HH:MM:SS[.fff]).
        position: String,
        /// Output image path; the extension picks the format.
        #[arg(long)]
        out: PathBuf,
    },

    /// Save a run of frames to a directory.
    #[command(
        about = "Save sequential frames",
        after_help = "Examples:\n  frameseek dump input.mp4 --out frames --every 5\n  frameseek dump input.mp4 --out frames --start 0:00:30 --limit 100 --progress"
    )]
    Dump {
        /// Input media path.
        input: PathBuf,
        /// Output directory.
        #[arg(long)]
        out: PathBuf,
        /// Save every Nth frame.
        #[arg(long, default_value_t = 1)]
        every: u64,
        /// Stop after saving this many frames.
        #[arg(long)]
        limit: Option<u64>,
        /// First frame, as an index or timecode.
        #[arg(long)]
        start: Option<String>,
        /// Output image extension (png, jpg, jpeg, bmp, tiff).
        #[arg(long, default_value = "png")]
        ext: String,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn parse_timecode(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(Duration::from_secs_f64(seconds.max(0.0)));
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("invalid time format: {trimmed}").into());
    }

    let (hours, minutes, seconds_str) = if parts.len() == 3 {
        (parts[0].parse::<u64>()?, parts[1].parse::<u64>()?, parts[2])
    } else {
        (0_u64, parts[0].parse::<u64>()?, parts[1])
    };

    let seconds = seconds_str.parse::<f64>()?;
    let total_seconds = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    Ok(Duration::from_secs_f64(total_seconds.max(0.0)))
}

/// A plain integer is a frame index; anything with a colon is a timecode.
fn parse_frame_position(
    value: &str,
    frames_per_second: f64,
) -> Result<i64, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if !trimmed.contains(':') {
        if let Ok(index) = trimmed.parse::<i64>() {
            if index < 0 {
                return Err(format!("frame index must not be negative: {index}").into());
            }
            return Ok(index);
        }
    }

    if frames_per_second <= 0.0 {
        return Err("frame rate is unknown; pass a frame index instead of a timecode".into());
    }
    let timestamp = parse_timecode(trimmed)?;
    Ok((timestamp.as_secs_f64() * frames_per_second).round() as i64)
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn open_input(
    input: &Path,
    global: &GlobalOptions,
) -> Result<FfmpegSession, Box<dyn std::error::Error>> {
    let mut backend = FfmpegBackend::new();
    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        backend = backend.with_log_level(parsed);
    }

    let mut options = SessionOptions::new().with_channel_order(ChannelOrder::Rgb);
    if let Some(threshold) = global.forward_threshold {
        options = options.with_forward_decode_threshold(threshold);
    }

    let mut session = FfmpegSession::with_options(backend, options);
    session.open(input)?;
    Ok(session)
}

/// Output file name for the `ordinal`-th picture of a dump, or `None` when
/// `--every` skips it. Ordinals count pictures read, starting at the first
/// dumped frame, so pictures drained at end-of-stream still get their own
/// names.
fn dump_file_name(ordinal: i64, start_frame: i64, every: u64, ext: &str) -> Option<String> {
    if (ordinal - start_frame).rem_euclid(every as i64) != 0 {
        return None;
    }
    Some(format!("frame_{ordinal:06}.{ext}"))
}

fn save_buffer(
    buffer: &PixelBuffer,
    path: &Path,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    buffer.to_rgb_image().save(path)?;
    if verbose {
        eprintln!("saved {}", path.display());
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input, json } => {
            let session = open_input(&input, &cli.global)?;
            let metadata = session.metadata().ok_or("No video stream")?;

            if json {
                let payload = json!({
                    "path": input.display().to_string(),
                    "track": metadata.track_index,
                    "width": metadata.width,
                    "height": metadata.height,
                    "frame_rate": metadata.frame_rate.to_string(),
                    "fps": metadata.frames_per_second(),
                    "frame_count": metadata.frame_count,
                    "codec": metadata.codec_name,
                    "pixel_format": metadata.pixel_format,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Track: {}", metadata.track_index);
                println!(
                    "Video: {}x{} @ {:.3} fps ({}) [{}]",
                    metadata.width,
                    metadata.height,
                    metadata.frames_per_second(),
                    metadata.frame_rate,
                    metadata.codec_name,
                );
                println!("Frames: {}", metadata.frame_count);
                if let Some(pixel_format) = &metadata.pixel_format {
                    println!("Pixel format: {pixel_format}");
                }
            }
        }

        Commands::Frame {
            input,
            position,
            out,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let mut session = open_input(&input, &cli.global)?;
            let index =
                parse_frame_position(&position, session.frames_per_second().unwrap_or(0.0))?;

            let buffer = session
                .read_frame(index)?
                .ok_or(format!("frame {index} is not in the stream"))?;
            save_buffer(&buffer, &out, cli.global.verbose)?;
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Saved frame {index} to {}", out.display()).green()
            );
        }

        Commands::Keyframe {
            input,
            position,
            out,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let mut session = open_input(&input, &cli.global)?;
            let index =
                parse_frame_position(&position, session.frames_per_second().unwrap_or(0.0))?;

            let landed = session
                .seek_key_frame(index)?
                .ok_or(format!("no keyframe found at or before frame {index}"))?;
            let (width, height) = (
                session.width().unwrap_or(0),
                session.height().unwrap_or(0),
            );
            let mut buffer = PixelBuffer::new(width, height);
            if !session.fetch_picture(&mut buffer)? {
                return Err(format!("no picture decoded at keyframe {landed}").into());
            }
            save_buffer(&buffer, &out, cli.global.verbose)?;
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Saved keyframe {landed} (requested {index}) to {}", out.display())
                    .green()
            );
        }

        Commands::Dump {
            input,
            out,
            every,
            limit,
            start,
            ext,
        } => {
            if every == 0 {
                return Err("--every must be greater than 0".into());
            }

            if out.exists() {
                if !cli.global.overwrite {
                    return Err(format!(
                        "output directory already exists: {} (use --overwrite)",
                        out.display()
                    )
                    .into());
                }
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("writing into existing directory {}", out.display()).yellow()
                );
            }
            fs::create_dir_all(&out)?;

            let mut session = open_input(&input, &cli.global)?;
            let (width, height) = (
                session.width().unwrap_or(0),
                session.height().unwrap_or(0),
            );
            let frame_count = session.frame_count().unwrap_or(0);
            let start_frame = match start {
                Some(start) => {
                    parse_frame_position(&start, session.frames_per_second().unwrap_or(0.0))?
                }
                None => 0,
            };

            let expected = {
                let remaining = frame_count.saturating_sub(start_frame as u64);
                let stepped = remaining.div_ceil(every);
                limit.map_or(stepped, |limit| stepped.min(limit))
            };
            let progress_bar = if cli.global.progress {
                let pb = ProgressBar::new(expected);
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                Some(pb)
            } else {
                None
            };

            let ext_clean = ext.trim_start_matches('.').to_ascii_lowercase();
            let mut buffer = PixelBuffer::new(width, height);
            let mut have_frame = if start_frame > 0 {
                session.seek_frame(start_frame)? && session.fetch_picture(&mut buffer)?
            } else {
                session.read_next_frame_into(&mut buffer)?
            };

            let mut saved = 0_u64;
            let mut ordinal = start_frame;
            while have_frame {
                if limit.is_some_and(|limit| saved >= limit) {
                    break;
                }

                if let Some(file_name) = dump_file_name(ordinal, start_frame, every, &ext_clean) {
                    let output_path = out.join(file_name);
                    if output_path.exists() && !cli.global.overwrite {
                        return Err(format!(
                            "output file already exists: {} (use --overwrite)",
                            output_path.display()
                        )
                        .into());
                    }
                    save_buffer(&buffer, &output_path, cli.global.verbose)?;
                    saved += 1;
                    if let Some(pb) = &progress_bar {
                        pb.inc(1);
                    }
                }

                ordinal += 1;
                have_frame = session.read_next_frame_into(&mut buffer)?;
            }

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Saved {saved} frame(s) to {}", out.display()).green()
            );
        }

        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "frameseek", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{Cli, dump_file_name, parse_frame_position, parse_log_level, parse_timecode};
    use clap::CommandFactory;
    use frameseek::{StreamSession, scripted::ScriptedBackend};

    #[test]
    fn parse_log_level_aliases() {
        assert!(parse_log_level("quiet").is_some());
        assert!(parse_log_level("WARN").is_some());
        assert!(parse_log_level("warning").is_some());
        assert!(parse_log_level("trace").is_some());
        assert!(parse_log_level("loud").is_none());
    }

    #[test]
    fn parse_timecode_formats() {
        let seconds = parse_timecode("75").unwrap();
        assert_eq!(seconds.as_secs(), 75);

        let mm_ss = parse_timecode("01:15").unwrap();
        assert_eq!(mm_ss.as_secs(), 75);

        let hh_mm_ss = parse_timecode("00:01:15.5").unwrap();
        assert_eq!(hh_mm_ss.as_millis(), 75_500);

        assert!(parse_timecode("").is_err());
        assert!(parse_timecode("1:2:3:4").is_err());
    }

    #[test]
    fn frame_positions_accept_indices_and_timecodes() {
        assert_eq!(parse_frame_position("250", 25.0).unwrap(), 250);
        assert_eq!(parse_frame_position("00:00:10", 25.0).unwrap(), 250);
        assert_eq!(parse_frame_position("0:01", 29.97).unwrap(), 30);
        assert!(parse_frame_position("-3", 25.0).is_err());
        assert!(parse_frame_position("0:10", 0.0).is_err());
    }

    #[test]
    fn dump_names_follow_read_order() {
        assert_eq!(dump_file_name(0, 0, 1, "png").as_deref(), Some("frame_000000.png"));
        assert_eq!(dump_file_name(12, 10, 2, "jpg").as_deref(), Some("frame_000012.jpg"));
        assert_eq!(dump_file_name(13, 10, 2, "jpg"), None);
    }

    #[test]
    fn dump_names_stay_unique_through_decoder_drain() {
        // Pictures drained at end-of-stream repeat the last frame number.
        let backend = ScriptedBackend::new(6).with_decoder_delay(2);
        let mut session = StreamSession::open_with(backend, "delayed.mp4").unwrap();

        let mut names = Vec::new();
        let mut ordinal = 0;
        while session.read_next_frame().unwrap().is_some() {
            names.extend(dump_file_name(ordinal, 0, 1, "png"));
            ordinal += 1;
        }

        assert_eq!(names.len(), 6);
        assert_eq!(names.iter().collect::<HashSet<_>>().len(), names.len());
        assert_eq!(names.last().map(String::as_str), Some("frame_000005.png"));
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
