use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{HumanBytes, HumanDuration};
use owo_colors::OwoColorize;
use std::io;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

mod cache;
mod error;
mod extract;
mod manifest;
mod progress;
mod pull;
#[cfg(test)]
mod test_support;
mod transfer;
mod utils;

#[derive(Parser)]
#[command(name = "ctr-fetch")]
#[command(about = "Fetch a container image and unpack its layers into a directory")]
#[command(version)]
struct Cli {
    /// Image to fetch, e.g. docker.io/library/alpine:3.19
    image: String,

    /// Directory to unpack the image filesystem into
    path: PathBuf,

    /// The auth string, format is 'user:password'
    #[arg(long, env = "CTR_FETCH_AUTH", hide_env_values = true)]
    auth: Option<String>,

    /// Pull registry token
    #[arg(long, env = "CTR_FETCH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Skip TLS verification while pulling
    #[arg(long)]
    insecure: bool,

    /// Accept any image without checking the signature policy
    #[arg(long)]
    insecure_policy: bool,

    /// The base directory to store downloaded images, default is <tmp>/ctr-fetch
    #[arg(short, long, env = "CTR_FETCH_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Force re-download the image even if it is already present in the base directory
    #[arg(short, long)]
    force: bool,

    /// skopeo binary used to copy images from the registry
    #[arg(long, env = "CTR_FETCH_SKOPEO", default_value = "skopeo")]
    skopeo: PathBuf,

    /// When to colorize output: auto, always, never
    #[arg(long, default_value = "auto")]
    color: String,

    /// Log debug details to stderr (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let start = Instant::now();

    // Determine if we should use color
    let use_color = match cli.color.as_str() {
        "always" => true,
        "never" => false,
        _ => atty::is(atty::Stream::Stdout),
    };

    let (username, password) = match cli.auth.as_deref() {
        Some(auth) => {
            let (user, password) = parse_auth(auth)?;
            (Some(user), Some(password))
        }
        None => (None, None),
    };

    utils::ensure_dir(&cli.path)
        .with_context(|| format!("ensure dest directory {}", cli.path.display()))?;

    let options = pull::FetchOptions {
        base_dir: cli.base_dir.unwrap_or_else(cache::default_base_dir),
        force: cli.force,
        transfer: transfer::TransferOptions {
            username,
            password,
            token: cli.token,
            insecure: cli.insecure,
            insecure_policy: cli.insecure_policy,
        },
    };

    let skopeo = transfer::Skopeo::new(cli.skopeo);
    let image = pull::fetch(&cli.image, &options, &skopeo)
        .with_context(|| format!("pull image {}", cli.image))?;

    let size = {
        let stdout = io::stdout();
        let mut progress = progress::LineProgress::new(stdout.lock(), atty::is(atty::Stream::Stdout));
        extract::extract_all(&image.path, &image.manifest, &cli.path, &mut progress)
            .context("extract layers")?
    };

    let summary = format!(
        "Fetch done, extracted {} data, took {}",
        HumanBytes(size),
        HumanDuration(start.elapsed())
    );
    println!();
    if use_color {
        println!("{}", summary.green());
    } else {
        println!("{}", summary);
    }

    Ok(())
}

/// Split `user:password` on the first colon; the password may contain colons
fn parse_auth(auth: &str) -> Result<(String, String)> {
    match auth.split_once(':') {
        Some((user, password)) => Ok((user.to_string(), password.to_string())),
        None => bail!("invalid auth {:?}, should be 'user:password'", auth),
    }
}
