use std::{
    process::ExitCode,
    sync::atomic::Ordering,
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::ArgMatches;
use gnss_link::{Fix, GnssLink, GnssReader, IoHandle, LinkError, StartupReport};
use tracing::{info, warn};

mod cli;
mod logging;

fn main() -> Result<ExitCode> {
    let matches = cli::CommandBuilder::default().build().get_matches();
    logging::initialize(cli::log_level(&matches))?;

    let settings = cli::serial_settings(&matches);
    let transport = settings
        .open()
        .with_context(|| format!("Failed to open serial port {}", settings.path))?;
    let name = transport.name().unwrap_or_else(|| settings.path.clone());
    info!("Opened {} at {} baud", name, settings.baud_rate);

    let config = cli::link_config(&matches);
    let (mut reader, io) = GnssLink::spawn(transport, &config)?;
    let json = cli::json_output(&matches);

    let code = match matches.subcommand() {
        Some(("configure", _)) => configure(&mut reader, json)?,
        Some(("watch", sub)) => watch(&mut reader, &io, sub, json)?,
        Some(("reboot", _)) => reboot(&mut reader, json)?,
        _ => ExitCode::FAILURE,
    };

    let stats = io.shutdown()?;
    info!(
        "Link closed: {} sentences, {} frames, {} discarded, {} timeouts",
        stats.sentences, stats.frames, stats.discarded, stats.timeouts
    );
    Ok(code)
}

fn configure(reader: &mut GnssReader, json: bool) -> Result<ExitCode> {
    let report = reader.run_startup_configuration()?;
    print_report(&report, json)?;
    Ok(if report.all_confirmed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &StartupReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }
    for step in &report.steps {
        println!("{:<14} {:?}", step.name, step.outcome);
    }
    Ok(())
}

fn watch(
    reader: &mut GnssReader,
    io: &IoHandle,
    matches: &ArgMatches,
    json: bool,
) -> Result<ExitCode> {
    let interval = matches
        .get_one::<u64>("interval-ms")
        .map_or(Duration::from_secs(1), |ms| Duration::from_millis(*ms));

    if matches.get_flag("configure") {
        let report = reader.run_startup_configuration()?;
        for step in report.failed() {
            warn!("Startup step '{}' failed: {:?}", step.name, step.outcome);
        }
    }

    let cancel = io.cancel_flag();
    ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed))
        .context("Failed to install Ctrl-C handler")?;

    let stop = io.cancel_flag();
    while !stop.load(Ordering::Relaxed) {
        match reader.latest_fix() {
            Ok(Some(fix)) => print_fix(&fix, json)?,
            Ok(None) => info!("Waiting for the first fix"),
            Err(LinkError::Disconnected) => {
                warn!("I/O loop stopped");
                return Ok(ExitCode::FAILURE);
            },
            Err(e) => return Err(e.into()),
        }
        thread::sleep(interval);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_fix(fix: &Fix, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(fix)?);
        return Ok(());
    }
    let time = fix
        .time
        .map_or_else(|| "--:--:--".to_string(), |t| t.to_string());
    match (fix.latitude, fix.longitude) {
        (Some(lat), Some(lon)) if fix.is_valid() => println!(
            "{} {} lat {:.6} lon {:.6} alt {} sats {} hdop {}",
            time,
            fix.talker,
            lat,
            lon,
            fix.altitude.map_or_else(|| "-".to_string(), |a| format!("{:.1} m", a)),
            fix.satellites,
            fix.hdop.map_or_else(|| "-".to_string(), |h| format!("{:.2}", h)),
        ),
        _ => println!("{} {} no fix, sats {}", time, fix.talker, fix.satellites),
    }
    Ok(())
}

fn reboot(reader: &mut GnssReader, json: bool) -> Result<ExitCode> {
    let confirmed = reader.reboot()?;
    if json {
        println!("{}", serde_json::json!({ "reboot": confirmed }));
    } else if confirmed {
        println!("Reset acknowledged");
    } else {
        println!("Reset not acknowledged");
    }
    Ok(if confirmed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
