use anyhow::{Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use midi_conveyor::{
    Args, DefaultEngine, DurationStyle, Player, Song, ViewConfig, import_midi_song, load_note_sheet,
    project_note, save_note_sheet, sheet_to_song, song_to_note_sheet,
};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match args.config.as_ref() {
        Some(path) => {
            info!("Loading view settings: '{}'...", path.display());
            ViewConfig::load(path)?
        }
        None => ViewConfig::default(),
    }
    .with_args(&args);

    info!("Importing: '{}'...", args.input.display());
    let song = load_song(&args.input, args.bpm)?;

    debug!(
        "Imported song '{}' at {:.3} BPM with {} voice(s), {} notes, {:.3}s long..!",
        song.metadata
            .title
            .clone()
            .unwrap_or_else(|| "<unknown>".into()),
        song.metadata.tempo_bpm,
        song.voices.len(),
        song.note_count(),
        song.end_seconds()
    );

    if song.note_count() == 0 {
        bail!("Nothing to play, no complete notes were found..!");
    }

    if let Some(path) = args.export_sheet.as_ref() {
        let bpm = args.bpm.unwrap_or(song.metadata.tempo_bpm);
        let style = if args.quantize {
            DurationStyle::Quantized
        } else {
            DurationStyle::Seconds
        };

        info!("Exporting note sheet at {:.3} BPM: '{}'...", bpm, path.display());
        save_note_sheet(path, &song_to_note_sheet(&song, bpm, style)?)?;
        return Ok(());
    }

    if args.dry_run {
        info!("Previewing at most {} notes per voice..!", args.dry_run_max);
        for (v, voice) in song.voices.iter().enumerate() {
            info!("Voice {}: '{}' ({} notes)", v, voice.label, voice.notes.len());
            for (i, note) in voice.notes.iter().take(args.dry_run_max).enumerate() {
                let placed = project_note(note, 0.0, &config);
                info!(
                    "  {:>4}: {:>4} start={:>9.3}s dur={:>7.3}s vel={:.2} left={:>9.1}px width={:>7.1}px top={:>5.1}% color={}",
                    i,
                    placed.name,
                    note.start_seconds,
                    note.duration_seconds,
                    note.velocity,
                    placed.left_pixel,
                    placed.width_pixel,
                    placed.vertical_offset_percent,
                    placed.color_key
                );
            }
        }
        return Ok(());
    }

    let player = Player::new(DefaultEngine::new(args.verbose), args.delay_start);
    player.load_song(song, config)?;

    let player = Arc::new(player);
    let player_for_handler = Arc::clone(&player);

    ctrlc::set_handler(move || {
        warn!("Ctrl-C received, stopping playback..!");
        if let Err(why) = player_for_handler.stop() {
            warn!("Failed to stop playback: {:?}", why);
        }
    })?;

    player.play(true)?;
    info!("Playback finished, exiting..!");

    Ok(())
}

fn load_song(path: &Path, bpm: Option<f64>) -> Result<Song> {
    let is_sheet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_sheet {
        let mut sheet = load_note_sheet(path)?;
        if let Some(bpm) = bpm {
            sheet.bpm = bpm;
        }
        if sheet.title.is_none() {
            sheet.title = path.file_name().and_then(|s| s.to_str()).map(String::from);
        }
        return Ok(sheet_to_song(&sheet)?);
    }

    if bpm.is_some() {
        debug!("MIDI files play at their own tempo, --bpm only affects sheets..!");
    }

    Ok(import_midi_song(path)?)
}
