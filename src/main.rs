//! KVBus command-line tool
//!
//! Runs one store operation against a JSON file. Each invocation restores the
//! store from the file, runs the operation and persists the result, so expired
//! keys evicted along the way are dropped from the file too.

use anyhow::{bail, Context};
use kvbus::{JsonFileAdapter, SetOptions, Store};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Default data file when neither `--file` nor `KVBUS_FILE` is given
const DEFAULT_FILE: &str = "kvbus.json";

/// The operation to run
#[derive(Debug, PartialEq)]
enum Command {
    Set {
        key: String,
        value: Value,
        lifetime: Option<Duration>,
        overwrite: bool,
    },
    Get(String),
    Has(String),
    Del(String),
    Ttl(String),
    Clean,
    Keys,
}

/// Tool configuration
#[derive(Debug, PartialEq)]
struct Config {
    /// File the store is restored from and persisted to
    file: PathBuf,
    command: Command,
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args<I>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut file = std::env::var_os("KVBUS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE));
        let mut lifetime = None;
        let mut overwrite = false;
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--file" | "-f" => {
                    let Some(path) = args.next() else {
                        bail!("--file requires a value");
                    };
                    file = PathBuf::from(path);
                }
                "--ttl" | "-t" => {
                    let Some(ms) = args.next() else {
                        bail!("--ttl requires a value");
                    };
                    let ms: u64 = ms
                        .parse()
                        .with_context(|| format!("invalid ttl: {}", ms))?;
                    lifetime = Some(Duration::from_millis(ms));
                }
                "--overwrite" | "-o" => overwrite = true,
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("KVBus version {}", kvbus::VERSION);
                    std::process::exit(0);
                }
                // Negative numbers are values, not flags
                flag if flag.starts_with('-')
                    && flag.len() > 1
                    && flag.parse::<f64>().is_err() =>
                {
                    bail!("unknown argument: {}", flag);
                }
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let Some(name) = positional.next() else {
            bail!("missing command, see --help");
        };
        let key = positional.next().context("missing key");

        let command = match name.as_str() {
            "set" => {
                let key = key?;
                let raw = positional.next().context("missing value")?;
                Command::Set {
                    key,
                    value: parse_value(&raw),
                    lifetime,
                    overwrite,
                }
            }
            "get" => Command::Get(key?),
            "has" => Command::Has(key?),
            "del" => Command::Del(key?),
            "ttl" => Command::Ttl(key?),
            "clean" => Command::Clean,
            "keys" => Command::Keys,
            other => bail!("unknown command: {}", other),
        };

        Ok(Self { file, command })
    }
}

/// Parses a value as JSON, falling back to a plain string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_help() {
    println!(
        r#"
KVBus - An In-Process Key-Value Store with Expiry

USAGE:
    kvbus [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    set <key> <value>    Store a value (parsed as JSON, else a string)
    get <key>            Print a value
    has <key>            Print whether a key is live
    del <key>            Remove a key
    ttl <key>            Print remaining lifetime in ms (-1 for none)
    clean                Evict expired keys
    keys                 List live keys

OPTIONS:
    -f, --file <PATH>    Data file (default: $KVBUS_FILE or kvbus.json)
    -t, --ttl <MS>       Lifetime for set, in milliseconds
    -o, --overwrite      Let set replace a live key
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    kvbus set name '"Ariz"'
    kvbus set session abc123 --ttl 60000
    kvbus get session

LOGGING:
    Set RUST_LOG (e.g. RUST_LOG=debug) to see store activity on stderr.
"#
    );
}

/// Runs one command, printing its result
fn run(store: &mut Store<Value>, command: Command) -> kvbus::Result<()> {
    match command {
        Command::Set {
            key,
            value,
            lifetime,
            overwrite,
        } => {
            let mut options = SetOptions::new();
            options.lifetime = lifetime;
            options.overwrite = overwrite;
            store.set(key, value, options)?;
            println!("OK");
        }
        Command::Get(key) => println!("{}", store.get(&key)?),
        Command::Has(key) => println!("{}", store.has(&key)),
        Command::Del(key) => println!("{}", u8::from(store.delete(&key))),
        Command::Ttl(key) => match store.ttl(&key)? {
            Some(left) => println!("{}", left.as_millis()),
            None => println!("-1"),
        },
        Command::Clean => println!("{}", store.clean()),
        Command::Keys => {
            store.clean();
            let mut keys: Vec<&str> = store.keys().collect();
            keys.sort_unstable();
            for key in keys {
                println!("{}", key);
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Set up logging on stderr so stdout stays clean for results
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_args(std::env::args().skip(1))?;
    debug!(?config, "Parsed arguments");

    let mut store: Store<Value> = Store::new().with_adapter(JsonFileAdapter::new(&config.file));
    store.restore()?;
    info!(file = %config.file.display(), keys = store.len(), "Store loaded");

    // Persist even when the command fails, reads may have evicted keys
    let outcome = run(&mut store, config.command);
    store.persist()?;

    Ok(outcome?)
}
