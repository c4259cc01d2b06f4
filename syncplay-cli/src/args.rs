//! Command line flags.

use std::path::PathBuf;

use syncplay_core::Config;

pub const USAGE: &str = "\
usage: syncplay [options]

  --host <name>         server host
  --port <port>         server port
  --calibration <ms>    delay between PLAY and playback start
  --media-root <dir>    directory PLAY file names are resolved against
  --reconnect           reconnect automatically after a lost connection
  --config <path>       extra config file merged over the user config
  -v, --verbose         debug logging
  -h, --help            this text

While running, type: status, connect, disconnect, stop, quit";

#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    pub verbose: bool,
    pub help: bool,
    pub reconnect: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub calibration_ms: Option<u64>,
    pub media_root: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

impl CliArgs {
    /// Parse everything after the program name.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut parsed = CliArgs {
            verbose: args.iter().any(|a| a == "--verbose" || a == "-v"),
            help: args.iter().any(|a| a == "--help" || a == "-h"),
            reconnect: args.iter().any(|a| a == "--reconnect"),
            ..Default::default()
        };

        parsed.host = flag_value(args, "--host")?.map(str::to_string);
        parsed.port = flag_value(args, "--port")?
            .map(|v| v.parse().map_err(|_| format!("invalid port: {}", v)))
            .transpose()?;
        parsed.calibration_ms = flag_value(args, "--calibration")?
            .map(|v| v.parse().map_err(|_| format!("invalid calibration delay: {}", v)))
            .transpose()?;
        parsed.media_root = flag_value(args, "--media-root")?.map(PathBuf::from);
        parsed.config_path = flag_value(args, "--config")?.map(PathBuf::from);

        if let Some(unknown) = args.iter().find(|a| a.starts_with('-') && !is_known(a)) {
            return Err(format!("unknown option: {}", unknown));
        }
        Ok(parsed)
    }

    /// Command line values win over config files.
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.set_host(host.clone());
        }
        if let Some(port) = self.port {
            config.set_port(port);
        }
        if let Some(ms) = self.calibration_ms {
            config.set_calibration_ms(ms);
        }
        if let Some(root) = &self.media_root {
            config.set_media_root(root.clone());
        }
        if self.reconnect {
            config.set_auto_reconnect(true);
        }
    }
}

const VALUE_FLAGS: [&str; 5] = ["--host", "--port", "--calibration", "--media-root", "--config"];

fn is_known(arg: &str) -> bool {
    VALUE_FLAGS.contains(&arg)
        || matches!(arg, "--verbose" | "-v" | "--help" | "-h" | "--reconnect")
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>, String> {
    match args.iter().position(|a| a == flag) {
        Some(i) => match args.get(i + 1) {
            Some(value) if !value.starts_with("--") => Ok(Some(value.as_str())),
            _ => Err(format!("{} needs a value", flag)),
        },
        None => Ok(None),
    }
}
