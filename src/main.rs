use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use folderify::{
    Config, DEBUG_ENV, FolderCustomizer, OutputRequest, SchemePreference, SetIconUsing,
    StyleEpoch, system_color_scheme, system_macos_version,
};
use tracing_subscriber::EnvFilter;

/// Generate a native-style macOS folder icon from a mask file.
#[derive(Debug, Parser)]
#[command(name = "folderify", version, about)]
struct Cli {
    /// Mask image (PNG or SVG with a transparent background).
    mask: Option<PathBuf>,

    /// File or folder whose icon should be set.
    target: Option<PathBuf>,

    /// Reveal the target (or the generated icns) in Finder.
    #[arg(short, long)]
    reveal: bool,

    /// macOS version to match, e.g. "10.9", "10.14" or "14.2". Defaults to the running system.
    #[arg(long = "macOS", visible_alias = "macos", alias = "osx", value_name = "VERSION")]
    macos: Option<String>,

    #[arg(long, value_enum, default_value_t = SchemePreference::Auto)]
    color_scheme: SchemePreference,

    /// Keep transparent margins around the mask.
    #[arg(long)]
    no_trim: bool,

    /// Tool used to attach the icon to the target.
    #[arg(long, value_enum, value_name = "TOOL")]
    set_icon_using: Option<SetIconUsing>,

    /// Write the .icns file here.
    #[arg(long, value_name = "PATH")]
    output_icns: Option<PathBuf>,

    /// Write the .iconset directory here.
    #[arg(long, value_name = "PATH")]
    output_iconset: Option<PathBuf>,

    /// Number of render threads. Defaults to the number of CPUs.
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// JSON config file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log every step.
    #[arg(short, long)]
    verbose: bool,

    /// Remember the mask for TARGET so it can be restored later.
    #[arg(long, requires = "target")]
    cache_add: bool,

    /// List targets with a remembered mask.
    #[arg(
        long,
        conflicts_with_all = ["mask", "cache_remove", "cache_restore", "cache_restore_all"]
    )]
    cache_list: bool,

    /// Forget the remembered mask for TARGET.
    #[arg(
        long,
        value_name = "TARGET",
        conflicts_with_all = ["mask", "cache_restore", "cache_restore_all"]
    )]
    cache_remove: Option<PathBuf>,

    /// Re-apply the remembered mask to TARGET.
    #[arg(long, value_name = "TARGET", conflicts_with_all = ["mask", "cache_restore_all"])]
    cache_restore: Option<PathBuf>,

    /// Re-apply every remembered mask.
    #[arg(long, conflicts_with = "mask")]
    cache_restore_all: bool,

    /// Print a shell completion script and exit.
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "folderify", &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    let debug = std::env::var(DEBUG_ENV).is_ok_and(|v| v == "1");
    init_logging(cli.verbose || debug);
    tracing::debug!(?cli);

    match try_main(cli, debug) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose {
        "folderify=debug"
    } else {
        "folderify=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn try_main(cli: Cli, debug: bool) -> folderify::Result<ExitCode> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if debug && config.intermediates_dir.is_none() {
        let dir = std::env::temp_dir().join(format!("folderify-debug-{}", std::process::id()));
        config.intermediates_dir = Some(dir);
    }
    if cli.workers.is_some() {
        config.workers = cli.workers;
    }
    if cli.no_trim {
        config.no_trim = true;
    }
    if let Some(tool) = cli.set_icon_using {
        config.set_icon_using = tool;
    }

    let version = cli.macos.clone().or_else(system_macos_version);
    let epoch = StyleEpoch::select(version.as_deref(), cli.color_scheme, system_color_scheme);
    tracing::debug!(epoch = %epoch, "selected folder style");

    let customizer = FolderCustomizer::new(&config, epoch)
        .reveal(cli.reveal)
        .remember_masks(cli.cache_add);

    if cli.cache_list {
        for target in customizer.cache().list_all() {
            println!("{}", target?.display());
        }
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(target) = &cli.cache_remove {
        customizer.cache().remove(target)?;
        tracing::info!(target = %target.display(), "forgot mask");
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(target) = &cli.cache_restore {
        customizer.restore(target)?;
        return Ok(ExitCode::SUCCESS);
    }

    if cli.cache_restore_all {
        let report = customizer.restore_all();
        for (target, reason) in &report.skipped {
            tracing::warn!(target = %target.display(), "skipped: {reason}");
        }
        return Ok(if report.has_failures() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    }

    let Some(mask) = cli.mask else {
        // Help goes to stdout; a broken pipe here is not worth reporting.
        let _ = Cli::command().print_help();
        return Ok(ExitCode::SUCCESS);
    };

    let request = OutputRequest {
        target: cli.target,
        output_iconset: cli.output_iconset,
        output_icns: cli.output_icns,
    };
    let generated = customizer.generate(&mask, &request)?;
    for path in [&generated.iconset, &generated.icns].into_iter().flatten() {
        println!("{}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}
