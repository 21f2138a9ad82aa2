use clap::Subcommand;
use recap_cache::{ReportCaches, ReportsConfigLoader};
use recap_core::{ConnectionDescriptor, Credentials, Error, Result, RECAP_TARGET_PASSWORD_VAR};

pub mod worker;

#[derive(Subcommand)]
pub enum Commands {
    /// Print the path of an archived recording's report, generating it if needed
    ArchivedReport {
        /// Recording name as stored in the archive
        name: String,

        /// Report filter; empty for the full report
        #[arg(long, default_value = "")]
        filter: String,
    },

    /// Print the report of a recording on a live target
    ActiveReport {
        /// Target locator
        target: String,

        /// Recording name on the target
        name: String,

        /// Report filter; empty for the full report
        #[arg(long, default_value = "")]
        filter: String,

        /// Username for the target
        #[arg(long)]
        username: Option<String>,

        /// Environment variable holding the target password
        #[arg(long, default_value = RECAP_TARGET_PASSWORD_VAR)]
        password_env: String,
    },

    /// Delete every cached report of an archived recording
    Forget {
        /// Recording name as stored in the archive
        name: String,
    },

    /// Delete cached reports whose archived recording no longer exists
    Prune,

    /// Internal report worker (hidden from user)
    #[command(name = "worker", hide = true)]
    Worker {
        /// <locator> <recording-name|-> <destination> <filter>
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl Commands {
    pub async fn execute(self) -> Result<()> {
        let config = ReportsConfigLoader::load()?;
        let caches = ReportCaches::from_config(&config)?;

        match self {
            Commands::ArchivedReport { name, filter } => {
                let path = caches.archived.get(&name, &filter).await?;
                println!("{}", path.display());
                Ok(())
            }
            Commands::ActiveReport {
                target,
                name,
                filter,
                username,
                password_env,
            } => {
                let connection = connection_for(target, username, &password_env)?;
                let report = caches.active.get(&connection, &name, &filter).await?;
                println!("{report}");
                Ok(())
            }
            Commands::Forget { name } => {
                if caches.archived.delete(&name).await? {
                    tracing::info!("✓ Removed cached reports of {name}");
                } else {
                    tracing::info!("No cached reports for {name}");
                }
                Ok(())
            }
            Commands::Prune => {
                let pruned = caches.archived.prune_orphans().await?;
                tracing::info!("✓ Removed {pruned} orphaned report(s)");
                Ok(())
            }
            Commands::Worker { .. } => Err(Error::invalid_argument(
                "command",
                "the worker runs only as a child of recap",
            )),
        }
    }
}

fn connection_for(
    target: String,
    username: Option<String>,
    password_env: &str,
) -> Result<ConnectionDescriptor> {
    let Some(username) = username else {
        return Ok(ConnectionDescriptor::new(target));
    };
    let password = std::env::var(password_env).map_err(|_| {
        Error::invalid_argument(
            "password_env",
            format!("{password_env} must be set when --username is given"),
        )
    })?;
    Ok(ConnectionDescriptor::with_credentials(
        target,
        Credentials::new(username, password),
    ))
}
