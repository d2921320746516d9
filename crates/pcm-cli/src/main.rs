use anyhow::Result;
use clap::{Parser, Subcommand};
use pcm_schemas::{Action, EntityKind, Locale, Status};

mod commands;

#[derive(Parser)]
#[command(name = "pcm")]
#[command(about = "Pet-care marketplace order/report desk CLI", long_about = None)]
struct Cli {
    /// Layered config paths in merge order. Falls back to PCM_CONFIG.
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    /// Override `/ui/locale` for labels and messages (en | vi).
    #[arg(long, global = true)]
    locale: Option<Locale>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Load one page from the backend and print the filtered view
    List {
        /// order | report | store | user | staff (plural accepted)
        kind: EntityKind,

        #[arg(long)]
        status: Option<Status>,

        /// Case-insensitive text search over id and attributes
        #[arg(long)]
        search: Option<String>,

        #[arg(long = "shop-id")]
        shop_id: Option<String>,

        /// Attribute to sort by
        #[arg(long)]
        sort: Option<String>,

        #[arg(long, default_value_t = false)]
        desc: bool,

        /// Backend page to load (1-based)
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Print status tab badge counts for one backend page
    Counts {
        kind: EntityKind,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Apply a status action to one record
    Act {
        kind: EntityKind,
        id: String,
        action: Action,

        /// Staff member assigned on confirm
        #[arg(long = "staff")]
        staff_id: Option<String>,

        /// Reason for cancel / dispute / reject
        #[arg(long)]
        reason: Option<String>,

        /// Skip the interactive confirmation prompt.
        #[arg(long, default_value_t = false)]
        yes: bool,

        /// Backend page holding the record
        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Delete one record
    Delete {
        kind: EntityKind,
        id: String,

        /// Skip the interactive confirmation prompt.
        #[arg(long, default_value_t = false)]
        yes: bool,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => commands::config_hash(&paths),

        Commands::List {
            kind,
            status,
            search,
            shop_id,
            sort,
            desc,
            page,
        } => {
            let desk = commands::Desk::connect(&cli.config_paths, cli.locale)?;
            let filter = commands::records::ListFilter {
                status,
                search,
                shop_id,
                sort,
                desc,
            };
            commands::records::list(&desk, kind, page, &filter).await
        }

        Commands::Counts { kind, page } => {
            let desk = commands::Desk::connect(&cli.config_paths, cli.locale)?;
            commands::records::counts(&desk, kind, page).await
        }

        Commands::Act {
            kind,
            id,
            action,
            staff_id,
            reason,
            yes,
            page,
        } => {
            let desk = commands::Desk::connect(&cli.config_paths, cli.locale)?;
            let req = commands::records::ActRequest {
                kind,
                id,
                action,
                staff_id,
                reason,
                page,
            };
            commands::records::act(&desk, req, &commands::TerminalConfirmer::new(yes)).await
        }

        Commands::Delete { kind, id, yes, page } => {
            let desk = commands::Desk::connect(&cli.config_paths, cli.locale)?;
            commands::records::delete(&desk, kind, id, page, &commands::TerminalConfirmer::new(yes))
                .await
        }
    }
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
