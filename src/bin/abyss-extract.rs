//! Unpacks an `.abyss` recording into its overview GIF, per-character
//! combat logs and a loot listing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use abyss_blackbox_lib::{init_tracing, read_artifact, AbyssRecording};
use clap::Parser;

#[derive(Parser)]
#[command(name = "abyss-extract")]
#[command(about = "Extract the contents of an abyss run recording", long_about = None)]
struct Cli {
    /// Recording to unpack
    file: PathBuf,

    /// Directory for the extracted files (default: current directory)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("abyss-extract: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let recording = read_artifact(&cli.file)
        .map_err(|e| format!("Failed to read recording '{}': {e}", cli.file.display()))?;

    let out_dir = cli.out.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)
        .map_err(|e| format!("Failed to create output folder '{}': {e}", out_dir.display()))?;

    let base_name = cli
        .file
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "recording".to_string());

    let gif_path = out_dir.join(format!("{base_name}.gif"));
    std::fs::write(&gif_path, &recording.overview)
        .map_err(|e| format!("Failed to write '{}': {e}", gif_path.display()))?;

    for (index, record) in recording.combat_log.iter().enumerate() {
        println!(
            "combat log record language for character {:?}: {}",
            record.character_name,
            record.language().label()
        );

        let log_path = out_dir.join(combat_log_file_name(&record.character_name, index));
        if let Err(error) = write_lines(&log_path, &record.combat_log_lines) {
            tracing::warn!(
                log_path = %log_path.display(),
                io_error = %error,
                "Failed to write combat log"
            );
        }
    }

    let loot_path = out_dir.join(format!("{base_name}.loot.txt"));
    write_loot(&loot_path, &recording)
        .map_err(|e| format!("Failed to write '{}': {e}", loot_path.display()))?;

    println!(
        "{}: {} overview bytes, {} loot records, {} combat logs, weather {}%, recorded by {}",
        base_name,
        recording.overview.len(),
        recording.loot.len(),
        recording.combat_log.len(),
        recording.weather_strength,
        if recording.recorder_version.is_empty() {
            "unknown recorder"
        } else {
            recording.recorder_version.as_str()
        }
    );
    if let Some(label) = recording.manual_type_label() {
        println!("manual abyss type: {label}");
    }

    Ok(())
}

/// Character names come from the artifact, so they are reduced to one
/// plain file-name component that stays inside the output folder.
fn combat_log_file_name(character_name: &str, index: usize) -> String {
    let sanitized: String = character_name
        .trim()
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        return format!("character_{index}.combatlog.txt");
    }

    format!("{sanitized}.combatlog.txt")
}

fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()
}

fn write_loot(path: &Path, recording: &AbyssRecording) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "Loot recordings:")?;
    for record in &recording.loot {
        writeln!(writer, "time: {}s\n{}\n", record.frame, record.loot)?;
    }
    writer.flush()
}
