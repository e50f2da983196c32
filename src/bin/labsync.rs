use labsync_rs::config::{ConfigOverrides, RemoteOverrides, RunOverrides, SyncConfig};
use labsync_rs::{HttpStore, LabSync, Sheet, TabularSource};

fn parse_arg(flag: &str) -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|arg| arg == flag)
}

/// Flags that consume the following argument as their value.
const VALUE_FLAGS: &[&str] = &[
    "-s",
    "--source",
    "-n",
    "--name",
    "-c",
    "--config",
    "-o",
    "--output",
    "--node",
    "--base-url",
    "--secret",
    "--timezone",
    "--batch-size",
];

/// First positional argument, skipping flags and their values.
fn find_command<I: IntoIterator<Item = String>>(args: I) -> Option<String> {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
        } else if !arg.starts_with('-') {
            return Some(arg);
        }
    }
    None
}

fn print_help() {
    eprintln!(
        r#"labsync - Sync lab request sheets with the remote store

USAGE:
    labsync <COMMAND> --source <CSV> [OPTIONS]

COMMANDS:
    sync-requests       Push new request rows and write their ids back
    link-ids            Fill missing ids from matching remote requests
    sync-assignments    Record decisions with adjusted rejection counters
    color-grid          Compute the status color grid of a slot sheet
    sync-slots          Replace subject timeslots with those in the sheet
    repopulate          Delete a requests node and rebuild it from the sheet

OPTIONS:
    -s, --source <CSV>      Source sheet (header row + data rows)
    -n, --name <NAME>       Source name used for routing [default: file stem]
    -c, --config <FILE>     Path to config file (TOML)
    -o, --output <CSV>      Output for color-grid [default: stdout]
        --node <NODE>       Target node for repopulate [default: routed requests node]
        --base-url <URL>    Override remote base URL
        --secret <SECRET>   Override remote auth secret
        --timezone <TZ>     Override timezone [default: Europe/Rome]
        --batch-size <N>    Override records per write [default: 50]
    -h, --help              Print help

ENVIRONMENT:
    LABSYNC_CONFIG              Path to config file
    LABSYNC_REMOTE__BASE_URL    Remote base URL
    LABSYNC_REMOTE__SECRET      Remote auth secret

CONFIG FILE (labsync.toml):
    [remote]
    base_url = "https://example-default-rtdb.europe-west1.firebasedatabase.app"

    [sync]
    batch_size = 50
"#
    );
}

fn build_overrides() -> anyhow::Result<ConfigOverrides> {
    let mut overrides = ConfigOverrides::default();

    let remote = RemoteOverrides {
        base_url: parse_arg("--base-url"),
        secret: parse_arg("--secret"),
    };
    if remote.base_url.is_some() || remote.secret.is_some() {
        overrides.remote = Some(remote);
    }

    let batch_size = match parse_arg("--batch-size") {
        Some(raw) => Some(raw.parse()?),
        None => None,
    };
    let sync = RunOverrides {
        timezone: parse_arg("--timezone"),
        batch_size,
    };
    if sync.timezone.is_some() || sync.batch_size.is_some() {
        overrides.sync = Some(sync);
    }

    Ok(overrides)
}

fn main() -> anyhow::Result<()> {
    if has_flag("-h") || has_flag("--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt::init();

    let Some(command) = find_command(std::env::args().skip(1)) else {
        print_help();
        anyhow::bail!("missing command");
    };

    // Load config: CLI > Env > File > Defaults
    let config_path = parse_arg("--config")
        .or_else(|| parse_arg("-c"))
        .or_else(|| std::env::var("LABSYNC_CONFIG").ok());
    let config = SyncConfig::load(config_path.as_deref(), build_overrides()?)?;

    let source_path = parse_arg("--source")
        .or_else(|| parse_arg("-s"))
        .ok_or_else(|| anyhow::anyhow!("--source is required"))?;
    let mut sheet = Sheet::from_csv_path(&source_path)?;
    if let Some(name) = parse_arg("--name").or_else(|| parse_arg("-n")) {
        sheet.set_name(name);
    }

    let store = HttpStore::new(&config.remote);
    let mut sync = LabSync::new(store, config)?;

    match command.as_str() {
        "sync-requests" => {
            let summary = sync.sync_requests(&mut sheet)?;
            sheet.save_csv(&source_path)?;
            println!("{summary}");
        }
        "link-ids" => {
            let summary = sync.link_request_ids(&mut sheet)?;
            sheet.save_csv(&source_path)?;
            println!("{summary}");
        }
        "sync-assignments" => {
            let summary = sync.sync_assignments(&sheet)?;
            println!("{summary}");
        }
        "color-grid" => {
            let grid = sync.status_grid(&sheet)?;
            let colors = grid.to_sheet(sheet.name());
            match parse_arg("--output").or_else(|| parse_arg("-o")) {
                Some(path) => colors.save_csv(path)?,
                None => colors.write_csv(std::io::stdout().lock())?,
            }
            eprintln!("{} cells colored", grid.colored());
        }
        "sync-slots" => {
            let summary = sync.sync_timeslots(&sheet)?;
            println!("{summary}");
        }
        "repopulate" => {
            let node = match parse_arg("--node") {
                Some(node) => node,
                None => {
                    let destination = labsync_rs::payload::destination_for(
                        sheet.name(),
                        &sync.config().sync.secondary_markers,
                    );
                    sync.config().nodes.requests_for(destination).to_string()
                }
            };
            let summary = sync.repopulate(&sheet, &node)?;
            println!("{summary}");
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}");
        }
    }

    Ok(())
}
