//! Estimate camera movement over a directory of frames.
//!
//! Movement can be cached between runs, burnt into copies of the frames, and used to add
//! camera-adjusted positions to object tracks.

use clap::*;
use lk_estimator::{LkEstimator, LkSettings};
use log::*;
use panflow::cache;
use panflow::frame::{list_frames, load_frame};
use panflow::prelude::v1::{Result, *};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("movement-extract")
        .version(crate_version!())
        .about(crate_description!())
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .takes_value(true)
                .required_unless_present("dump-config")
                .help("Directory of frame images, processed in file name order"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .takes_value(true)
                .help("Directory to write frames with the movement overlay to"),
        )
        .arg(
            Arg::new("cache")
                .long("cache")
                .short('c')
                .takes_value(true)
                .help("Movement cache file, relative to the user cache directory"),
        )
        .arg(
            Arg::new("tracks")
                .long("tracks")
                .short('t')
                .takes_value(true)
                .help("Object tracks to add positions to"),
        )
        .arg(
            Arg::new("tracks-out")
                .long("tracks-out")
                .takes_value(true)
                .requires("tracks")
                .help("Where to write updated tracks (stdout by default)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .takes_value(true)
                .help("Estimator settings in JSON"),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .short('s')
                .takes_value(true)
                .multiple_occurrences(true)
                .help("Override an estimator property, in name=value form"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .short('b')
                .takes_value(true)
                .default_value("50"),
        )
        .arg(
            Arg::new("dump-config")
                .long("dump-config")
                .help("Print the effective settings and exit"),
        )
        .get_matches();

    let settings = match matches.value_of("config") {
        Some(path) => load_settings(path)?,
        None => LkSettings::default(),
    };

    let mut estimator = LkEstimator::new(settings);

    for assignment in matches.values_of("set").into_iter().flatten() {
        let (name, value) = parse_assignment(assignment)?;
        estimator.set_prop(name, value)?;
    }

    if matches.is_present("dump-config") {
        println!("{}", serde_json::to_string_pretty(estimator.settings())?);
        return Ok(());
    }

    let input = matches
        .value_of("input")
        .ok_or_else(|| anyhow!("No input directory supplied"))?;
    let batch_size: usize = matches.value_of_t("batch-size")?;

    let paths = list_frames(input)?;

    if paths.is_empty() {
        return Err(anyhow!("No frames found in {input}"));
    }

    info!("Processing {} frames from {input}", paths.len());

    let movement = match matches.value_of("cache") {
        Some(key) => estimate_cached(&mut estimator, &paths, batch_size, key)?,
        None => estimate(&mut estimator, &paths, batch_size)?,
    };

    let mut used = false;

    if let Some(output) = matches.value_of("output") {
        write_overlay(&paths, &movement, output, batch_size)?;
        used = true;
    }

    if let Some(tracks) = matches.value_of("tracks") {
        update_tracks(tracks, matches.value_of("tracks-out"), &movement)?;
        used = true;
    }

    if !used {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for m in &movement {
            writeln!(out, "{} {}", m.dx, m.dy)?;
        }
    }

    Ok(())
}

fn load_settings(path: &str) -> Result<LkSettings> {
    let file = File::open(path).map_err(|e| anyhow!("Unable to open config {path}: {e}"))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn parse_assignment(assignment: &str) -> Result<(&str, &str)> {
    assignment
        .split_once('=')
        .map(|(n, v)| (n.trim(), v.trim()))
        .ok_or_else(|| anyhow!("Expected name=value, got {assignment}"))
}

/// Estimate movement, loading frames lazily one batch at a time.
fn estimate(
    estimator: &mut LkEstimator,
    paths: &[PathBuf],
    batch_size: usize,
) -> Result<Vec<Movement>> {
    let mut error = None;

    let frames = paths.iter().map_while(|p| match load_frame(p) {
        Ok(frame) => Some(frame),
        Err(e) => {
            error = Some(e);
            None
        }
    });

    let movement = process_in_batches(estimator, frames, batch_size);

    match error {
        Some(e) => Err(e),
        None => Ok(movement),
    }
}

fn estimate_cached(
    estimator: &mut LkEstimator,
    paths: &[PathBuf],
    batch_size: usize,
    key: &str,
) -> Result<Vec<Movement>> {
    let store = FileStore::default();
    info!("Using movement cache {}", store.path(key).display());

    cache::try_get_or_compute(&store, key, paths.len(), || {
        estimate(estimator, paths, batch_size)
    })
}

fn write_overlay(
    paths: &[PathBuf],
    movement: &[Movement],
    output: &str,
    batch_size: usize,
) -> Result<()> {
    let output = Path::new(output);
    std::fs::create_dir_all(output)?;

    let batch_size = batch_size.max(1);

    for (paths, movement) in paths.chunks(batch_size).zip(movement.chunks(batch_size)) {
        let frames = paths.iter().map(load_frame).collect::<Result<Vec<_>>>()?;

        for (path, frame) in paths.iter().zip(draw_camera_movement(&frames, movement)) {
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid frame path {}", path.display()))?;
            frame.save(output.join(name))?;
        }
    }

    info!("Wrote {} annotated frames to {}", movement.len(), output.display());

    Ok(())
}

fn update_tracks(input: &str, output: Option<&str>, movement: &[Movement]) -> Result<()> {
    let file = File::open(input).map_err(|e| anyhow!("Unable to open tracks {input}: {e}"))?;
    let mut tracks: Tracks = serde_json::from_reader(BufReader::new(file))?;

    tracks.normalise_len(movement.len());
    tracks.add_positions();
    tracks.add_adjusted_positions(movement);

    match output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            serde_json::to_writer(&mut out, &tracks)?;
            out.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            serde_json::to_writer(stdout.lock(), &tracks)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments() {
        assert_eq!(
            parse_assignment("Min movement = 2.5").unwrap(),
            ("Min movement", "2.5")
        );
        assert!(parse_assignment("window").is_err());
    }
}
