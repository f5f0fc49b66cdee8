//! Release installer CLI entrypoint.
//!
//! This binary installs prebuilt release binaries described by a manifest,
//! lists the releases a manifest offers, and checks that every artefact of a
//! release downloads and matches its checksum.

use clap::Parser;
use release_installer::artefact::download::HttpDownloader;
use release_installer::artefact::extraction::ArchiveExtractor;
use release_installer::artefact::fetch::CancelToken;
use release_installer::cli::{CheckReleaseArgs, Cli, Command, InstallArgs, ListArgs};
use release_installer::config::Settings;
use release_installer::dirs::SystemBaseDirs;
use release_installer::error::{InstallerError, Result};
use release_installer::list_output::{format_human, format_json};
use release_installer::manifest::{ManifestStore, load_manifest};
use release_installer::output::write_stderr_line;
use release_installer::pipeline::{InstallRequest, PipelineDeps, VerifyMode, run_install};
use release_installer::platform::{HostDetector, PlatformDetector, resolve_detector};
use release_installer::release_check::check_release;
use release_installer::verify::ProcessProbe;
use log::{debug, warn};
use std::io::Write;
use std::time::Duration;

/// Exit status for a run stopped by Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

/// How long an interrupted fetch gets to unwind before its files are removed.
const INTERRUPT_GRACE: Duration = Duration::from_millis(500);

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &cancel, &mut stderr);
    let exit_code = interrupted_exit_code(
        exit_code_for_run_result(run_result, &mut stderr),
        &cancel,
    );
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Cancels `cancel` on Ctrl-C.
///
/// A fetch blocked in a read never sees the flag, so after the grace period
/// the handler removes any partial downloads itself and exits.
fn install_interrupt_handler(cancel: &CancelToken) {
    let token = cancel.clone();
    let installed = ctrlc::set_handler(move || {
        token.cancel();
        std::thread::sleep(INTERRUPT_GRACE);
        let removed = token.discard_scratch();
        debug!("interrupted; removed {removed} partial download(s)");
        std::process::exit(EXIT_INTERRUPTED);
    });
    if let Err(err) = installed {
        warn!("failed to install Ctrl-C handler: {err}");
    }
}

/// Reports a failed run as interrupted when the token was cancelled.
fn interrupted_exit_code(exit_code: i32, cancel: &CancelToken) -> i32 {
    if exit_code != 0 && cancel.is_cancelled() {
        EXIT_INTERRUPTED
    } else {
        exit_code
    }
}

/// Initialises `env_logger`; `RUST_LOG` takes precedence over `-v`/`-q`.
fn init_logging(cli: &Cli) {
    let env = env_logger::Env::default().default_filter_or(cli.log_level().as_str());
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn run(cli: &Cli, cancel: &CancelToken, stderr: &mut dyn Write) -> Result<()> {
    let settings = Settings::resolve(&cli.overrides(), &SystemBaseDirs)?;
    let store = load_manifest(&settings.manifest)?;

    match &cli.command {
        Command::Install(args) => {
            run_install_command(cli, args, &settings, &store, cancel, stderr)
        }
        Command::List(args) => run_list(args, &store),
        Command::CheckRelease(args) => {
            run_check_release(args, &settings, &store, cancel, stderr)
        }
    }
}

fn run_install_command(
    cli: &Cli,
    args: &InstallArgs,
    settings: &Settings,
    store: &ManifestStore,
    cancel: &CancelToken,
    stderr: &mut dyn Write,
) -> Result<()> {
    let detector = resolve_detector(args.os.as_deref(), args.arch.as_deref())?;
    let downloader = HttpDownloader::new(settings.timeout);
    let extractor = ArchiveExtractor;
    let probe = ProcessProbe::default();
    let deps = PipelineDeps {
        detector: detector.as_ref(),
        downloader: &downloader,
        extractor: &extractor,
        probe: &probe,
        cancel: cancel.clone(),
    };
    let request = InstallRequest {
        version: args.version.as_deref(),
        bin_dir: &settings.bin_dir,
        verify: verify_mode(args, settings),
        dry_run: args.dry_run,
        quiet: cli.quiet,
    };

    run_install(store, &request, &deps, stderr).map(|_| ())
}

/// Chooses the version-check mode from `--skip-verify` and the settings.
fn verify_mode(args: &InstallArgs, settings: &Settings) -> VerifyMode {
    if args.skip_verify {
        VerifyMode::Skip
    } else {
        VerifyMode::Check(settings.verify_policy)
    }
}

fn run_list(args: &ListArgs, store: &ManifestStore) -> Result<()> {
    let text = if args.json {
        format_json(store)
    } else {
        format_human(store, HostDetector.detect().ok())
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", text.trim_end())
        .map_err(|source| InstallerError::OutputFailed { source })
}

fn run_check_release(
    args: &CheckReleaseArgs,
    settings: &Settings,
    store: &ManifestStore,
    cancel: &CancelToken,
    stderr: &mut dyn Write,
) -> Result<()> {
    let downloader = HttpDownloader::new(settings.timeout);
    let report = check_release(store, &args.version, &downloader, cancel)?;

    write_stderr_line(stderr, report.display_text());
    match report.into_first_failure() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            err.exit_code()
        }
    }
}
