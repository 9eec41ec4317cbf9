use clap::Parser;

use clipforge_cli::{commands, Cli, Commands, WorkflowAction};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Provider keys may live in .env / .env.local
    clipforge_core::config::load_dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "clipforge_core=warn,clipforge_server=warn,clipforge_cli=info".into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Some(Commands::Server { host, port }) => {
            commands::server::run(host, port, cli.db, cli.config).await
        }

        Some(Commands::Create {
            prompt,
            mode,
            platforms,
            params,
        }) => {
            let state = commands::init_state(&cli.db, cli.config.as_deref()).await;
            commands::create::run(&state, &prompt, mode.as_deref(), &platforms, &params).await
        }

        Some(Commands::Plan {
            prompt,
            mode,
            platforms,
        }) => {
            let state = commands::init_state(&cli.db, cli.config.as_deref()).await;
            commands::plan::run(&state, &prompt, mode.as_deref(), &platforms)
        }

        Some(Commands::Agents) => {
            let state = commands::init_state(&cli.db, cli.config.as_deref()).await;
            commands::agents::list(&state).await
        }

        Some(Commands::Workflow { action }) => {
            let state = commands::init_state(&cli.db, cli.config.as_deref()).await;
            match action {
                WorkflowAction::Get { id } => commands::workflow::get(&state, &id).await,
                WorkflowAction::List { limit } => commands::workflow::list(&state, limit).await,
                WorkflowAction::Delete { id } => commands::workflow::delete(&state, &id).await,
            }
        }

        None => {
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
