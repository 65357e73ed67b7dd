use clap::{Parser, Subcommand};
use snafu::{ResultExt, Snafu};

mod commands;
mod files;
mod logging;

pub const APP_NAME: &str = "provisionctl";

/// Environment variable holding the log filter. `{LOG_ENV}_DIRECTORY` enables file logging.
pub const LOG_ENV: &str = "PROVISIONCTL_LOG";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to build discovery ignition config"))]
    Discovery { source: commands::discovery::Error },

    #[snafu(display("failed to generate installation ignition configs"))]
    Bootstrap { source: commands::bootstrap::Error },

    #[snafu(display("failed to build day-2 ignition config"))]
    Day2 { source: commands::day2::Error },

    #[snafu(display("failed to merge ignition configs"))]
    Merge { source: commands::documents::Error },

    #[snafu(display("failed to extract cluster ID"))]
    ClusterId { source: commands::documents::Error },
}

#[derive(Debug, Parser)]
#[command(name = APP_NAME, author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the boot config of the discovery image of an infra env.
    Discovery(commands::discovery::DiscoveryArguments),

    /// Post-process the installer output in a working directory and derive the config of
    /// every host from it.
    Bootstrap(commands::bootstrap::BootstrapArguments),

    /// Print the pointer config of a host joining an installed cluster.
    Day2(commands::day2::Day2Arguments),

    /// Merge an override document into a base document.
    Merge(commands::documents::MergeArguments),

    /// Print the cluster ID recorded in a bootstrap document.
    ClusterId(commands::documents::ClusterIdArguments),
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    logging::initialize_logging(LOG_ENV, APP_NAME).context(InitializeLoggingSnafu)?;

    match cli.command {
        Command::Discovery(arguments) => commands::discovery::run(arguments)
            .await
            .context(DiscoverySnafu),
        Command::Bootstrap(arguments) => commands::bootstrap::run(arguments)
            .await
            .context(BootstrapSnafu),
        Command::Day2(arguments) => commands::day2::run(arguments).await.context(Day2Snafu),
        Command::Merge(arguments) => commands::documents::merge(arguments)
            .await
            .context(MergeSnafu),
        Command::ClusterId(arguments) => commands::documents::cluster_id(arguments)
            .await
            .context(ClusterIdSnafu),
    }
}
