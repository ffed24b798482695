use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Top-level CLI entry point for the module engine.
#[derive(Parser, Debug)]
#[command(
    name = "dotmodules",
    about = "Install dotfiles modules from a git repository",
    version = crate::version_string()
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Tree that files are installed into (defaults to $HOME)
    #[arg(long, global = true, value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Install modules one at a time (parallel is enabled by default)
    #[arg(long = "no-parallel", global = true, action = clap::ArgAction::SetFalse)]
    pub parallel: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clone the dotfiles repository
    Download(RepoOpts),
    /// Install modules
    Install(ModuleOpts),
    /// Uninstall modules
    Uninstall(ModuleOpts),
    /// Fast-forward the dotfiles repository
    Update(RepoOpts),
    /// Delete the settings cache or the local clone
    Clean(CleanOpts),
    /// Persist the local directory and remote repository
    Configure(RepoOpts),
    /// Validate every configuration document
    Validate(ValidateOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file of this command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Download(_) => "download",
            Self::Install(_) => "install",
            Self::Uninstall(_) => "uninstall",
            Self::Update(_) => "update",
            Self::Clean(_) => "clean",
            Self::Configure(_) => "configure",
            Self::Validate(_) => "validate",
            Self::Version => "version",
        }
    }
}

/// Local clone and remote repository overrides.
#[derive(Parser, Debug, Clone, Default)]
pub struct RepoOpts {
    /// Local directory holding the dotfiles clone
    #[arg(short, long, value_name = "DIR")]
    pub local_directory: Option<PathBuf>,

    /// Remote dotfiles repository URL
    #[arg(short, long, value_name = "URL")]
    pub remote_repo: Option<String>,
}

/// Options for `install` and `uninstall`.
#[derive(Parser, Debug, Clone, Default)]
pub struct ModuleOpts {
    /// Modules to act on (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub modules: Vec<String>,

    /// Read the sudo password from the first line of stdin
    #[arg(long)]
    pub password_stdin: bool,

    /// Local directory holding the dotfiles clone
    #[arg(short, long, value_name = "DIR")]
    pub local_directory: Option<PathBuf>,
}

/// What `clean` deletes.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanTarget {
    /// The settings cache directory
    Cache,
    /// The local dotfiles clone
    Repo,
}

/// Options for the `clean` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CleanOpts {
    #[arg(id = "clean_target", value_name = "TARGET")]
    pub target: CleanTarget,
}

/// Options for the `validate` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct ValidateOpts {
    /// Directory to validate (default: the local clone)
    #[arg(short = 'D', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_install_modules() {
        let cli = Cli::parse_from(["dotmodules", "install", "-m", "vim,git"]);
        let Command::Install(opts) = cli.command else {
            panic!("expected install");
        };
        assert_eq!(opts.modules, vec!["vim", "git"]);
        assert!(!opts.password_stdin);
    }

    #[test]
    fn parse_uninstall_password_stdin() {
        let cli = Cli::parse_from(["dotmodules", "uninstall", "--password-stdin"]);
        let Command::Uninstall(opts) = cli.command else {
            panic!("expected uninstall");
        };
        assert!(opts.password_stdin);
        assert!(opts.modules.is_empty());
    }

    #[test]
    fn parse_install_dry_run_short() {
        let cli = Cli::parse_from(["dotmodules", "-d", "install"]);
        assert!(cli.global.dry_run);
    }

    #[test]
    fn parse_target_after_subcommand() {
        let cli = Cli::parse_from(["dotmodules", "install", "--target", "/tmp/home"]);
        assert_eq!(cli.global.target, Some(PathBuf::from("/tmp/home")));
    }

    #[test]
    fn parse_clean_targets() {
        let cli = Cli::parse_from(["dotmodules", "clean", "repo"]);
        assert!(matches!(
            cli.command,
            Command::Clean(CleanOpts {
                target: CleanTarget::Repo
            })
        ));
        assert!(Cli::try_parse_from(["dotmodules", "clean", "everything"]).is_err());
    }

    #[test]
    fn parse_configure_overrides() {
        let cli = Cli::parse_from([
            "dotmodules",
            "configure",
            "-l",
            "~/dots",
            "-r",
            "https://example.com/dots.git",
        ]);
        let Command::Configure(opts) = cli.command else {
            panic!("expected configure");
        };
        assert_eq!(opts.local_directory, Some(PathBuf::from("~/dots")));
        assert_eq!(opts.remote_repo.as_deref(), Some("https://example.com/dots.git"));
    }

    #[test]
    fn parse_validate_directory() {
        let cli = Cli::parse_from(["dotmodules", "validate", "--directory", "/repo"]);
        let Command::Validate(opts) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(opts.directory, Some(PathBuf::from("/repo")));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["dotmodules", "-v", "-q", "install"]).is_err());
        let cli = Cli::parse_from(["dotmodules", "-q", "update"]);
        assert!(cli.quiet);
        assert_eq!(cli.command.name(), "update");
    }

    #[test]
    fn parallel_is_enabled_by_default() {
        let cli = Cli::parse_from(["dotmodules", "install"]);
        assert!(cli.global.parallel, "parallel should be true by default");
    }

    #[test]
    fn no_parallel_disables_parallel() {
        let cli = Cli::parse_from(["dotmodules", "--no-parallel", "install"]);
        assert!(!cli.global.parallel);
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["dotmodules", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }
}
