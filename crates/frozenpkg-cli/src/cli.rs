use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use frozenpkg_core::{FreezeCommand, FreezeFormat, DEFAULT_CONFIG_FILE, DEFAULT_PART};

pub const FROZENPKG_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nGlobal options:\n{options}\n";

pub const FROZENPKG_BEFORE_HELP: &str = concat!(
    "frozenpkg ",
    env!("CARGO_PKG_VERSION"),
    " – Freeze a Python build environment into a relocatable package\n\n",
    "\x1b[1;36mCommands\x1b[0m\n",
    "  rpm              Stage the environment and build an RPM with rpmbuild.\n",
    "  tgz              Stage the environment and write <name>-<version>.tar.gz.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "frozenpkg",
    author,
    version,
    disable_help_subcommand = true,
    before_help = FROZENPKG_BEFORE_HELP,
    help_template = FROZENPKG_HELP_TEMPLATE
)]
pub struct FrozenpkgCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(about = "Freeze the build environment into an RPM via rpmbuild.")]
    Rpm(FreezeArgs),
    #[command(
        about = "Freeze the build environment into a tarball.",
        visible_alias = "tarball"
    )]
    Tgz(FreezeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FreezeArgs {
    #[arg(
        long,
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_FILE,
        help = "Configuration file describing the build environment and the part"
    )]
    pub config: PathBuf,
    #[arg(
        long,
        value_name = "NAME",
        default_value = DEFAULT_PART,
        help = "Part table holding the packaging options"
    )]
    pub part: String,
    #[arg(
        long = "set",
        value_name = "KEY=VALUE",
        help = "Override a part option (repeatable; use \\n for list values)"
    )]
    pub overrides: Vec<String>,
    #[arg(
        long,
        value_name = "DIR",
        help = "Where to copy the built artifacts (defaults to the build directory)"
    )]
    pub output_dir: Option<PathBuf>,
    #[arg(
        long,
        value_name = "DIR",
        help = "Parent directory for the scratch tree (defaults to the system temp dir)"
    )]
    pub work_dir: Option<PathBuf>,
    #[arg(long, help = "Keep the scratch tree for inspection")]
    pub debug: bool,
}

impl CommandGroupCli {
    pub fn to_command(&self) -> FreezeCommand {
        let (format, args) = match self {
            Self::Rpm(args) => (FreezeFormat::Rpm, args),
            Self::Tgz(args) => (FreezeFormat::Tarball, args),
        };
        FreezeCommand {
            format,
            config_path: args.config.clone(),
            part: args.part.clone(),
            overrides: args.overrides.clone(),
            output_dir: args.output_dir.clone(),
            work_dir: args.work_dir.clone(),
            debug: args.debug,
        }
    }
}
