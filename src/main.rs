use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nix_bump::command::{CommandRunner, ProcessRunner};
use nix_bump::config::{Settings, UpdateOptions, VersionSpec, config_path};
use nix_bump::eval::NixEvaluator;
use nix_bump::update::{UpdateOutcome, Updater};
use nix_bump::version::FetcherRegistry;
use nix_bump::version::http::HttpClient;

#[derive(Parser, Debug)]
#[command(name = "nix-bump")]
#[command(about = "Update the version, source hash and dependency hashes of a Nix package")]
#[command(disable_version_flag = true)]
struct Cli {
    /// Attribute path of the package to update
    #[arg(default_value = "")]
    attribute: String,

    /// File or flake to import
    #[arg(short = 'f', long = "file", default_value = "./")]
    file: PathBuf,

    /// Treat --file as a flake
    #[arg(short = 'F', long)]
    flake: bool,

    /// stable, unstable, skip, branch, branch=<name> or a literal version
    #[arg(long, default_value = "stable")]
    version: String,

    /// Regex the fetched version must match; capture groups are joined with '.'
    #[arg(long, default_value = "(.*)")]
    version_regex: String,

    /// Sub-attribute to update after the package itself (repeatable)
    #[arg(short = 's', long = "subpackage")]
    subpackages: Vec<String>,

    /// Write changes to this file instead of where the version is declared
    #[arg(long)]
    override_filename: Option<PathBuf>,

    /// Source URL to resolve versions from instead of the package's src
    #[arg(long)]
    url: Option<String>,

    /// Run the package's passthru.updateScript instead
    #[arg(short = 'u', long)]
    use_update_script: bool,

    /// Arguments passed to the update script
    #[arg(long, allow_hyphen_values = true, num_args = 1.., value_delimiter = ' ')]
    update_script_args: Vec<String>,

    /// Regenerate the lockfile instead of only its hashes
    #[arg(long)]
    generate_lockfile: bool,

    /// Directory holding the lockfile inside the source tree
    #[arg(long, default_value = ".")]
    lockfile_metadata_path: String,

    /// Only update the source hash, not dependency hashes
    #[arg(long)]
    src_only: bool,

    /// Leave the source hash alone
    #[arg(long)]
    no_src: bool,

    /// Read GitHub releases from the API instead of the Atom feed
    #[arg(long)]
    use_github_releases: bool,

    /// System used for evaluation and builds
    #[arg(long)]
    system: Option<String>,

    /// Nix option to set (repeatable)
    #[arg(long = "option", num_args = 2, value_names = ["NAME", "VALUE"])]
    options: Vec<String>,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn update_options(&self) -> anyhow::Result<UpdateOptions> {
        anyhow::ensure!(
            !self.attribute.is_empty(),
            "no attribute given, e.g. `nix-bump hello`"
        );
        let import_path = std::fs::canonicalize(&self.file)
            .with_context(|| format!("cannot resolve {}", self.file.display()))?;

        let mut extra_flags = vec![
            "--extra-experimental-features".to_string(),
            "flakes nix-command".to_string(),
        ];
        if let Some(system) = &self.system {
            extra_flags.extend(["--system".to_string(), system.clone()]);
        }
        for pair in self.options.chunks(2) {
            extra_flags.push("--option".to_string());
            extra_flags.extend(pair.iter().cloned());
        }

        let mut opts = UpdateOptions::new(&self.attribute, import_path)?;
        opts.flake = self.flake;
        opts.version = self.version.parse::<VersionSpec>()?;
        opts.version_regex = self.version_regex.clone();
        opts.subpackages = self.subpackages.clone();
        opts.override_filename = self.override_filename.clone();
        opts.url = self.url.clone();
        opts.use_update_script = self.use_update_script;
        opts.update_script_args = self.update_script_args.clone();
        opts.generate_lockfile = self.generate_lockfile;
        opts.lockfile_metadata_path = self.lockfile_metadata_path.clone();
        opts.src_only = self.src_only;
        opts.update_src = !self.no_src;
        opts.use_github_releases = self.use_github_releases;
        opts.system = self.system.clone();
        opts.extra_flags = extra_flags;
        Ok(opts)
    }
}

fn init_logging(cli: &Cli) -> tracing_appender::non_blocking::WorkerGuard {
    let default_level = if cli.quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
    guard
}

fn print_outcome(outcome: &UpdateOutcome) {
    let package = &outcome.package;
    match &outcome.new_version {
        Some(version) => println!(
            "{}: {} -> {}",
            package.attribute, package.old_version, version.number
        ),
        None => println!("{}: {}", package.attribute, package.old_version),
    }
    println!("changed: {}", outcome.changed);
    if let Some(url) = &outcome.diff_url {
        println!("diff: {url}");
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let opts = cli.update_options()?;
    let settings = Settings::load(&config_path())?;

    let http = HttpClient::new(&settings.http)?;
    let registry = FetcherRegistry::new(&http);
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);
    let evaluator = Arc::new(NixEvaluator::new(Arc::clone(&runner)));
    let updater = Updater::new(registry, evaluator, runner, settings);

    let outcome = updater.update(&opts).await?;
    print_outcome(&outcome);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}
