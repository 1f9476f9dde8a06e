use clap::Parser;
use color_eyre::Result;
use content_calendar::cli::{self, Cli, Commands};
use content_calendar::{logging, Config, Profile, Services};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };
    let log_file = logging::init(profile);

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path, profile)?,
        None => Config::load_with_profile(profile)?,
    };
    tracing::info!(?profile, log_file = ?log_file, "starting");

    let command = cli.command.unwrap_or(Commands::Tui);

    let token = cli.token.or_else(|| config.auth_token.clone());

    match command {
        // Offline, never touches the database
        Commands::Normalize { input, output } => cli::handle_normalize(input, output)?,
        Commands::Tui => {
            let (services, rejected) = Services::start(&config, token.as_deref())?;
            let app = content_calendar::tui::App::new(config, services, rejected);
            content_calendar::tui::run_event_loop(app)?;
        }
        Commands::IssueToken { name } => {
            let services = Services::open(&config)?;
            cli::handle_issue_token(name, services.database())?;
            services.shutdown()?;
        }
        command => {
            let (services, rejected) = Services::start(&config, token.as_deref())?;
            if let Some(e) = rejected {
                eprintln!("{}", e);
            }
            match command {
                Commands::Add(args) => cli::handle_add(args, &services)?,
                Commands::List { month } => cli::handle_list(month, &services)?,
                Commands::Delete { id } => cli::handle_delete(id, &services)?,
                Commands::Grid { month } => cli::handle_grid(month, config.week_start(), &services)?,
                Commands::Tui | Commands::IssueToken { .. } | Commands::Normalize { .. } => {}
            }
            services.shutdown()?;
        }
    }

    Ok(())
}
