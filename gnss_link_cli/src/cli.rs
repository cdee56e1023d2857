use std::time::Duration;

use clap::{value_parser, Arg, ArgAction, ArgMatches};
use gnss_link::{LinkConfig, SerialSettings};

pub struct CommandBuilder {
    command: clap::Command,
}

impl Default for CommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuilder {
    pub fn new() -> Self {
        let command = clap::Command::new("gnss-link")
            .about("Configure and watch a u-blox GNSS receiver over a serial port")
            .version(clap::crate_version!())
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                Arg::new("port")
                    .value_name("port")
                    .short('p')
                    .long("port")
                    .required(true)
                    .help("Serial port the receiver is connected to"),
            )
            .arg(
                Arg::new("baud")
                    .value_name("baud")
                    .short('s')
                    .long("baud")
                    .default_value("9600")
                    .global(true)
                    .value_parser(value_parser!(u32))
                    .help("Baud rate for the selected port"),
            )
            .arg(
                Arg::new("ack-timeout-ms")
                    .value_name("ms")
                    .long("ack-timeout-ms")
                    .default_value("10000")
                    .global(true)
                    .value_parser(value_parser!(u64))
                    .help("How long a command waits for its acknowledgement"),
            )
            .arg(
                Arg::new("queue-capacity")
                    .value_name("entries")
                    .long("queue-capacity")
                    .default_value("1000")
                    .global(true)
                    .value_parser(value_parser!(u64).range(1..))
                    .help("Capacity of the sentence and binary frame queues"),
            )
            .arg(
                Arg::new("log-level")
                    .long("log-level")
                    .global(true)
                    .value_parser(["error", "warn", "info", "debug", "trace"])
                    .help("Log verbosity, overrides RUST_LOG"),
            )
            .arg(
                Arg::new("json")
                    .long("json")
                    .global(true)
                    .action(ArgAction::SetTrue)
                    .help("Print results as JSON lines"),
            )
            .subcommand(
                clap::Command::new("configure")
                    .about("Keep only GGA output and enable the airborne dynamic model"),
            )
            .subcommand(
                clap::Command::new("watch")
                    .about("Print the newest position fix until interrupted")
                    .arg(
                        Arg::new("interval-ms")
                            .value_name("ms")
                            .long("interval-ms")
                            .default_value("1000")
                            .value_parser(value_parser!(u64))
                            .help("Delay between two printed fixes"),
                    )
                    .arg(
                        Arg::new("configure")
                            .long("configure")
                            .action(ArgAction::SetTrue)
                            .help("Run the startup configuration before watching"),
                    ),
            )
            .subcommand(clap::Command::new("reboot").about("Hardware reset of the receiver"));
        Self { command }
    }

    pub fn build(&self) -> clap::Command {
        self.command.clone()
    }
}

pub fn serial_settings(matches: &ArgMatches) -> SerialSettings {
    let port = matches
        .get_one::<String>("port")
        .cloned()
        .unwrap_or_default();
    let baud = matches.get_one::<u32>("baud").copied().unwrap_or(9600);
    SerialSettings::new(port).with_baud_rate(baud)
}

pub fn link_config(matches: &ArgMatches) -> LinkConfig {
    let mut config = LinkConfig::default();
    if let Some(ms) = matches.get_one::<u64>("ack-timeout-ms") {
        config = config.with_ack_timeout(Duration::from_millis(*ms));
    }
    if let Some(capacity) = matches.get_one::<u64>("queue-capacity") {
        config = config.with_queue_capacity(usize::try_from(*capacity).unwrap_or(usize::MAX));
    }
    config
}

pub fn log_level(matches: &ArgMatches) -> Option<&str> {
    matches.get_one::<String>("log-level").map(String::as_str)
}

pub fn json_output(matches: &ArgMatches) -> bool {
    matches.get_flag("json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ArgMatches {
        CommandBuilder::new()
            .build()
            .try_get_matches_from(args)
            .unwrap()
    }

    #[test]
    fn defaults() {
        let matches = parse(&["gnss-link", "--port", "/dev/ttyUSB0", "configure"]);
        let settings = serial_settings(&matches);
        assert_eq!(settings.path, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(link_config(&matches), LinkConfig::default());
        assert_eq!(log_level(&matches), None);
        assert!(!json_output(&matches));
    }

    #[test]
    fn overrides() {
        let matches = parse(&[
            "gnss-link",
            "-p",
            "/dev/ttyACM0",
            "watch",
            "--baud",
            "115200",
            "--ack-timeout-ms",
            "500",
            "--queue-capacity",
            "10",
            "--log-level",
            "debug",
            "--json",
            "--interval-ms",
            "200",
        ]);
        assert_eq!(serial_settings(&matches).baud_rate, 115_200);
        let config = link_config(&matches);
        assert_eq!(config.ack_timeout, Duration::from_millis(500));
        assert_eq!(config.sentence_queue_capacity, 10);
        assert_eq!(log_level(&matches), Some("debug"));
        assert!(json_output(&matches));
        let (name, watch) = matches.subcommand().unwrap();
        assert_eq!(name, "watch");
        assert_eq!(watch.get_one::<u64>("interval-ms"), Some(&200));
    }

    #[test]
    fn empty_queues_are_refused() {
        let result = CommandBuilder::new().build().try_get_matches_from([
            "gnss-link",
            "--port",
            "/dev/ttyUSB0",
            "--queue-capacity",
            "0",
            "configure",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn subcommand_is_required() {
        assert!(CommandBuilder::new()
            .build()
            .try_get_matches_from(["gnss-link", "--port", "/dev/ttyUSB0"])
            .is_err());
    }
}
