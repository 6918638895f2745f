mod commands;
mod config;
mod logging;

use clap::{Parser, Subcommand};
use sitesync_core::SiteId;
use sitesync_sftp::LogFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sitesync")]
#[command(about = "Transfer files to and from configured SFTP sites", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/sitesync/config.toml")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    /// Override the configured log format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Files(FileCommands),

    /// List configured sites
    Sites,

    /// Write a starter configuration file
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum FileCommands {
    /// List a remote directory
    Ls {
        site: SiteId,

        /// Remote path; relative paths start at the site's target root
        #[arg(default_value = "")]
        path: String,
    },

    /// Upload a local file
    Put {
        site: SiteId,

        /// Local file to send
        local: PathBuf,

        /// Remote destination path
        remote: String,

        /// Read the file back and compare checksums
        #[arg(long)]
        verify: bool,

        /// Fail if the remote file already exists
        #[arg(long)]
        no_overwrite: bool,

        /// Print transfer progress to stderr
        #[arg(long)]
        progress: bool,
    },

    /// Download a remote file
    Get {
        site: SiteId,

        /// Remote file
        remote: String,

        /// Local destination (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a remote file or directory
    Rm {
        site: SiteId,

        path: String,

        /// Remove directories and their contents
        #[arg(short, long)]
        recursive: bool,
    },

    /// Create a remote directory
    Mkdir {
        site: SiteId,

        path: String,

        /// Create missing parent directories
        #[arg(short, long)]
        parents: bool,
    },

    /// Rename a remote file or directory
    Mv {
        site: SiteId,

        from: String,

        to: String,
    },

    /// Change permissions of a remote path
    Chmod {
        site: SiteId,

        /// Octal mode, e.g. 755
        mode: String,

        path: String,
    },

    /// Show details of a remote path
    Info {
        site: SiteId,

        path: String,
    },

    /// Search entry names under a remote directory
    Find {
        site: SiteId,

        /// Case-insensitive substring to match
        term: String,

        /// Directory to search from
        #[arg(default_value = "")]
        base: String,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Open a session and list the site's target root
    Test { site: SiteId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { force } = cli.command {
        return commands::init::init_config(&cli.config, force).await;
    }

    let mut config = config::load_config(&cli.config).await?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    let _log_guard = logging::init(&config.logging)?;

    match cli.command {
        Commands::Files(cmd) => commands::files::handle(config, cmd).await?,
        Commands::Sites => commands::sites::list(&config)?,
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}
