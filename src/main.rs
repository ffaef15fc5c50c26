mod build;
mod commands;
mod core;
mod release;

use clap::{Args, Parser, Subcommand};
use crate::commands::session::absolutize;
use crate::core::context::{ReleaseSelection, RunOptions};
use crate::core::error::{PkgError, PkgResult, print_error};
use crate::core::interrupt;
use crate::core::process::split_options;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "PKGREL_LOG";

/// Build RPM packages from tagged git commits and release them
#[derive(Parser)]
#[command(name = "pkgrel")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// Print debug diagnostics to stderr
  #[arg(long, global = true)]
  debug: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build a tarball, source package and/or binary packages
  Build {
    #[command(flatten)]
    target: TargetArgs,

    /// Build the source tarball
    #[arg(long)]
    tgz: bool,

    /// Build the source package
    #[arg(long)]
    srpm: bool,

    /// Build the binary packages
    #[arg(long)]
    rpm: bool,

    /// Install the binary packages after building them
    #[arg(short, long)]
    install: bool,
  },

  /// Release to CVS, dist-git and the build farm
  Release {
    #[command(flatten)]
    target: TargetArgs,

    /// Release to the CVS build system
    #[arg(long)]
    cvs: bool,

    /// Submit builds to the build farm
    #[arg(long)]
    koji: bool,

    /// Release to dist-git with fedpkg
    #[arg(long)]
    git: bool,

    /// Print the build farm tags the package would be built for
    #[arg(long)]
    list_tags: bool,

    /// Submit scratch builds
    #[arg(long)]
    scratch: bool,

    /// Print release commands instead of running them
    #[arg(long)]
    dry_run: bool,

    /// With --dry-run, print the skipped commands as JSON
    #[arg(long, requires = "dry_run")]
    plan_json: bool,

    /// Restrict the build farm release to these tags
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    only_tags: Vec<String>,

    /// Extra source files to upload to CVS
    #[arg(long, num_args = 1..)]
    cvs_new_sources: Vec<PathBuf>,
  },

  /// List build farm tags for the package
  Tags {
    /// Package to inspect (default: the spec file in the current directory)
    #[arg(long)]
    package: Option<String>,

    /// Restrict the listing to these tags
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    only_tags: Vec<String>,

    /// Include ineligible tags and say why
    #[arg(short, long)]
    verbose: bool,

    /// Output the tags as JSON
    #[arg(long)]
    json: bool,
  },
}

/// What to build, shared by `build` and `release`
#[derive(Args)]
struct TargetArgs {
  /// Package to build (default: the spec file in the current directory)
  #[arg(long)]
  package: Option<String>,

  /// Build this tag instead of the latest tagged version
  #[arg(long)]
  tag: Option<String>,

  /// Build the latest commit instead of the tagged one
  #[arg(long)]
  test: bool,

  /// Skip checking that the tag was pushed
  #[arg(long)]
  offline: bool,

  /// Package type (standard, no-archive, cvs, upstream)
  #[arg(long)]
  builder: Option<String>,

  /// Base directory for workspaces and artifacts
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Dist tag passed to rpmbuild, overriding per-tag disttags
  #[arg(long)]
  dist: Option<String>,

  /// Extra options passed to rpmbuild, quoted as for a shell
  #[arg(long, allow_hyphen_values = true)]
  rpmbuild_options: Option<String>,

  /// Leave the workspace in place after the run
  #[arg(long)]
  no_cleanup: bool,
}

impl TargetArgs {
  fn into_options(self) -> PkgResult<(RunOptions, Option<String>, Option<String>)> {
    let rpmbuild_options = match &self.rpmbuild_options {
      Some(line) => split_options(line)?,
      None => Vec::new(),
    };
    let options = RunOptions {
      test: self.test,
      dist: self.dist,
      offline: self.offline,
      rpmbuild_options,
      no_cleanup: self.no_cleanup,
      output_dir: self.output,
      builder: self.builder,
      ..Default::default()
    };
    Ok((options, self.package, self.tag))
  }
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn setup_logging(debug: bool) {
  let default_level = if debug { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();
}

fn main() {
  let cli = Cli::parse();
  setup_logging(cli.debug);
  if let Err(err) = interrupt::install_handler() {
    warn!("{}", err);
  }

  let result = match cli.command {
    Commands::Build {
      target,
      tgz,
      srpm,
      rpm,
      install,
    } => target.into_options().and_then(|(options, package, tag)| {
      let options = RunOptions {
        tgz,
        srpm,
        rpm,
        auto_install: install,
        ..options
      };
      commands::run_build(options, package, tag)
    }),

    Commands::Release {
      target,
      cvs,
      koji,
      git,
      list_tags,
      scratch,
      dry_run,
      plan_json,
      only_tags,
      cvs_new_sources,
    } => absolute_paths(&cvs_new_sources).and_then(|cvs_new_sources| {
      let (options, package, tag) = target.into_options()?;
      let options = RunOptions {
        release: ReleaseSelection {
          all: false,
          cvs,
          koji,
          git,
          list_tags,
        },
        scratch,
        dry_run,
        plan_json,
        only_tags,
        cvs_new_sources,
        ..options
      };
      commands::run_release(options, package, tag)
    }),

    Commands::Tags {
      package,
      only_tags,
      verbose,
      json,
    } => commands::run_tags(package, only_tags, verbose, json),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn absolute_paths(paths: &[PathBuf]) -> PkgResult<Vec<PathBuf>> {
  paths.iter().map(|path| absolutize(path)).collect()
}

fn handle_error(err: PkgError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
