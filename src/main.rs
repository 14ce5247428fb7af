//! Lightrack - keep a TCP connection up and notice when it goes down

use std::path::PathBuf;

use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use lightrack::app::{Tracker, TrackerStats};
use lightrack::config::{Config, LogConfig};
use lightrack::error::{Error, Result};

fn main() {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("lightrack: {}", e);
            eprintln!("Try 'lightrack --help' for more information.");
            std::process::exit(1);
        }
    };

    if args.help {
        print_help();
        return;
    }

    if args.version {
        print_version();
        return;
    }

    if args.gen_config {
        match Config::example().to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("lightrack: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = run(args) {
        if e.is_fatal() {
            // Logging is up by the time the tracker can fail
            error!("{}, giving up", e);
        } else {
            eprintln!("lightrack: {}", e);
        }
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    // Load configuration; command-line values win over the file
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    args.apply(&mut config)?;

    init_logging(&config.log);

    let tracker_config = config.validate()?;

    info!("Lightrack v{} starting...", env!("CARGO_PKG_VERSION"));

    // One thread: the tracker never has more than one socket in flight
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let tracker = Tracker::new(tracker_config);
        let stats = tracker.stats();

        #[cfg(unix)]
        tokio::spawn(report_stats_on_signal(stats.clone()));

        let result = tokio::select! {
            result = tracker.run() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down, stopped tracking {}", tracker.config().remote);
                Ok(())
            }
        };

        stats.log();
        result
    })?;

    info!("Goodbye!");
    Ok(())
}

fn init_logging(log: &LogConfig) {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse().ok())
        .or_else(|| log.level.parse().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("lightrack: failed to set tracing subscriber: {}", e);
    }
}

/// Log tracker statistics on SIGUSR1
#[cfg(unix)]
async fn report_stats_on_signal(stats: std::sync::Arc<TrackerStats>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigusr1 = match signal(SignalKind::user_defined1()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to setup SIGUSR1 handler: {}", e);
            return;
        }
    };

    while sigusr1.recv().await.is_some() {
        info!("Received SIGUSR1, printing tracker statistics...");
        stats.log();
    }
}

/// Command line arguments
#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    bind: Option<(String, Option<String>)>,
    to: Option<(String, Option<String>)>,
    timeout: Option<String>,
    count: Option<String>,
    gen_config: bool,
    version: bool,
    help: bool,
}

impl Args {
    fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Args::default();
        let mut args = args.into_iter().peekable();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    let path = args.next().ok_or_else(|| missing(&arg, "FILE"))?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "bind" | "to" => {
                    let ip = args.next().ok_or_else(|| missing(&arg, "IPADDR"))?;
                    // PORT is optional; anything numeric after the address is it
                    let port = args.next_if(|next| is_numeric(next));
                    if arg == "bind" {
                        parsed.bind = Some((ip, port));
                    } else {
                        parsed.to = Some((ip, port));
                    }
                }
                "timeout" => {
                    parsed.timeout = Some(args.next().ok_or_else(|| missing(&arg, "SECONDS"))?);
                }
                "count" => {
                    parsed.count = Some(args.next().ok_or_else(|| missing(&arg, "COUNT"))?);
                }
                "--gen-config" => parsed.gen_config = true,
                "-v" | "--version" => parsed.version = true,
                "-h" | "--help" => parsed.help = true,
                other => {
                    return Err(Error::Config(format!("unknown argument `{}'", other)));
                }
            }
        }

        Ok(parsed)
    }

    /// Merge command-line values into `config`
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some((ip, port)) = &self.bind {
            config.set_bind(ip, port.as_deref())?;
        }
        if let Some((ip, port)) = &self.to {
            config.set_to(ip, port.as_deref())?;
        }
        if let Some(timeout) = &self.timeout {
            config.set_timeout(timeout)?;
        }
        if let Some(count) = &self.count {
            config.set_count(count)?;
        }
        Ok(())
    }
}

fn missing(option: &str, value: &str) -> Error {
    Error::Config(format!("option `{}' expects {}", option, value))
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn print_help() {
    println!(r#"Lightrack - persistent TCP reachability tracker

USAGE:
    lightrack [OPTIONS] [bind IPADDR [PORT]] to IPADDR [PORT] [timeout SECONDS] [count COUNT]

ARGUMENTS:
    bind IPADDR [PORT]      Local address to connect from (port defaults to 8080)
    to IPADDR [PORT]        Remote address to track (port defaults to 8080)
    timeout SECONDS         Keep-alive interval and retry delay (default: 5)
                            Accepts ms/s/m/h suffixes; truncated to whole seconds
    count COUNT             Keep-alive retransmission count (default: 3)

OPTIONS:
    -c, --config <FILE>     Path to JSON configuration file
    --gen-config            Print an example configuration
    -v, --version           Print version information
    -h, --help              Print help information

EXAMPLES:
    lightrack to 192.0.2.10 22
    lightrack bind 192.0.2.1 to 192.0.2.10 443 timeout 10 count 5
    lightrack -c lightrack.json
    lightrack --gen-config > lightrack.json

SIGNALS:
    SIGUSR1                 Log connection statistics
"#);
}

fn print_version() {
    println!("Lightrack v{}", env!("CARGO_PKG_VERSION"));
    println!("A persistent TCP reachability tracker");
}
