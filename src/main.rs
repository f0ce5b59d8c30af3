//! dperf CLI entry point

use anyhow::{Context, Result};
use dperf::config::{cli::Cli, cli_convert, toml as config_toml, validator};
use dperf::coordinator::DriveTestCoordinator;
use dperf::output::{json, live, text};
use dperf::stats::progress::{ChannelSink, ProgressSink};
use dperf::util::cancel::CancelSignal;
use dperf::util::logger::initialize_logger;
use log::{debug, info, warn};
use std::io::{self, IsTerminal, Write};

/// Progress events buffered between IO slots and the display thread
const PROGRESS_CHANNEL_CAPACITY: usize = 4096;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    initialize_logger(cli.log_level.into());
    cli.validate()?;

    let file = match cli.config {
        Some(ref path) => config_toml::parse_toml_file(path)?,
        None => Default::default(),
    };
    let config = config_toml::merge_cli_with_config(&cli, file)?;
    config.validate().context("Invalid configuration")?;

    let paths = validator::validate_paths(&cli.paths)?;

    let backend = dperf::select_backend();
    debug!(
        "{} backend, {} IO threads on {} CPUs",
        backend.name(),
        paths.len() * config.io_per_drive,
        num_cpus::get()
    );

    let cancel = match cli.timeout {
        Some(ref s) => {
            let timeout = cli_convert::parse_duration(s).context("Invalid timeout")?;
            info!("Run deadline in {:?}", timeout);
            CancelSignal::with_timeout(timeout)
        }
        None => CancelSignal::new(),
    };
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            info!("Interrupted, stopping at the next block");
            cancel.cancel();
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let coordinator = DriveTestCoordinator::new(config, backend)?;

    let show_progress = !cli.no_progress && io::stderr().is_terminal();
    let report = if show_progress {
        let (sink, rx) = ChannelSink::bounded(PROGRESS_CHANNEL_CAPACITY);
        let display = live::spawn_live_display(rx, paths.clone(), live::REFRESH_INTERVAL)
            .context("Failed to start progress display")?;

        let report = coordinator.run(&paths, &cancel, Some(&sink as &dyn ProgressSink));

        let dropped = sink.dropped();
        // Closing the channel lets the display draw its final state and exit
        drop(sink);
        if display.join().is_err() {
            warn!("Progress display panicked");
        }
        if dropped > 0 {
            debug!("{} progress events dropped", dropped);
        }
        report
    } else {
        coordinator.run(&paths, &cancel, None)
    }?;

    let mut out = io::stdout().lock();
    if cli.json {
        json::write_json_report(&mut out, coordinator.config(), &report)?;
    } else {
        text::render_text(&mut out, &report.results, report.totals, coordinator.config().verbose)
            .context("Failed to write results")?;
    }
    out.flush()?;

    if let Some(err) = report.cancelled {
        return Err(err.into());
    }
    Ok(())
}
