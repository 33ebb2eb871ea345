//! Replay recorded motion vectors through the movement detector.

use anyhow::{anyhow, Context};
use clap::*;
use log::*;
use mvtrigger::prelude::v1::*;
use mvtrigger::stream::{open_input, FrameReader};
use std::io::BufReader;
use std::time::Instant;

mod timer;

use timer::Timer;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = Command::new("motion-watch")
        .version(crate_version!())
        .about("Runs movement detection over a recorded motion vector stream")
        .arg(
            Arg::new("input")
                .help("vector stream: file path or `-` for stdin")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("JSON detector configuration")
                .takes_value(true),
        )
        .arg(Arg::new("width").long("width").takes_value(true))
        .arg(Arg::new("height").long("height").takes_value(true))
        .arg(
            Arg::new("map")
                .long("map")
                .short('m')
                .help("grayscale sensitivity map")
                .takes_value(true),
        )
        .arg(
            Arg::new("sensitivity")
                .long("sensitivity")
                .short('s')
                .takes_value(true),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .short('t')
                .takes_value(true),
        )
        .arg(Arg::new("window").long("window").takes_value(true))
        .arg(Arg::new("trend-window").long("trend-window").takes_value(true))
        .arg(
            Arg::new("dump")
                .long("dump")
                .short('d')
                .help("magnitude dump path, `{frame}` is replaced with the frame number")
                .takes_value(true),
        )
        .arg(
            Arg::new("dump-interval")
                .long("dump-interval")
                .takes_value(true)
                .requires("dump"),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .short('f')
                .help("replay at this frame rate instead of as fast as possible")
                .takes_value(true),
        )
        .arg(
            Arg::new("all-frames")
                .long("all-frames")
                .short('a')
                .help("process every frame on the reading thread, never dropping any"),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => DetectorConfig::from_json_file(path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => DetectorConfig::default(),
    };

    apply_overrides(&matches, &mut config)?;

    let input = matches.value_of("input").unwrap();
    let fps = parse_arg::<f64>(&matches, "fps")?;
    let all_frames = matches.is_present("all-frames");

    let reader = FrameReader::new(BufReader::new(open_input(input)?));

    if all_frames {
        run_synchronous(&config, reader)
    } else {
        run_threaded(&config, reader, fps)
    }
}

fn parse_arg<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    matches
        .value_of(name)
        .map(|v| {
            v.parse()
                .map_err(|e| anyhow!("invalid value {v:?} for --{name}: {e}"))
        })
        .transpose()
}

fn apply_overrides(matches: &ArgMatches, config: &mut DetectorConfig) -> anyhow::Result<()> {
    if let Some(width) = parse_arg(matches, "width")? {
        config.pixel_width = width;
    }

    if let Some(height) = parse_arg(matches, "height")? {
        config.pixel_height = height;
    }

    if let Some(map) = matches.value_of("map") {
        config.map_path = Some(map.into());
    }

    if let Some(sensitivity) = parse_arg(matches, "sensitivity")? {
        config.sensitivity = sensitivity;
    }

    if let Some(threshold) = parse_arg(matches, "threshold")? {
        config.threshold = threshold;
    }

    if let Some(window) = parse_arg(matches, "window")? {
        config.filter.window_size = window;
    }

    if let Some(trend_window) = parse_arg(matches, "trend-window")? {
        config.filter.trend_window = trend_window;
    }

    if let Some(template) = matches.value_of("dump") {
        let mut dump = DumpConfig::new(template);
        if let Some(interval) = parse_arg(matches, "dump-interval")? {
            dump.interval = interval;
        }
        config.dump = Some(dump);
    }

    Ok(())
}

/// Feed every frame straight into the detector.
fn run_synchronous<R: std::io::Read>(
    config: &DetectorConfig,
    reader: FrameReader<R>,
) -> anyhow::Result<()> {
    let mut detector = Detector::from_config(config, |count: u32, _: MovementEvent| {
        println!("movement {count}");
    })?;

    for (i, frame) in reader.enumerate() {
        let frame = FrameBuffer::copy_from_bytes(&frame?)?;
        if let Err(e) = detector.process(&frame) {
            warn!("Skipping frame {}: {}", i, e);
        }
    }

    println!(
        "{} frames, {} movement events",
        detector.frames(),
        detector.events()
    );

    Ok(())
}

/// Feed frames through the worker thread, like an encoder would.
fn run_threaded<R: std::io::Read>(
    config: &DetectorConfig,
    reader: FrameReader<R>,
    fps: Option<f64>,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let handle = mvtrigger::initialize(config, move |count: u32, _: MovementEvent| {
        println!("{:10.3} movement {}", start.elapsed().as_secs_f64(), count);
    })?;

    let mut timer = Timer::from_option(fps)?;

    for frame in reader {
        if let Some(timer) = &mut timer {
            timer.tick();
        }
        handle.submit_frame(&frame?)?;
    }

    let stats = handle.stats();
    let summary = handle
        .finish()
        .ok_or_else(|| anyhow!("detection worker panicked"))?;

    println!(
        "{} frames read, {} processed, {} superseded, {} rejected, {} movement events",
        stats.published, summary.processed, stats.superseded, summary.rejected, summary.events
    );

    Ok(())
}
