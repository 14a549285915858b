mod cli;

use clap::Parser;

use cli::{Cli, Commands, PatternsCommands};

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = quill::settings::load_settings()?;

    match cli.command {
        Commands::Index { ledger } => cli::index::run(&ledger, &settings),
        Commands::Show {
            ledger,
            limit,
            from,
            to,
        } => cli::show::run(&ledger, &settings, limit, from, to),
        Commands::Suggest {
            ledger,
            patterns,
            all,
        } => cli::suggest::run(&ledger, &settings, patterns, all),
        Commands::Patterns { command } => match command {
            PatternsCommands::Check { file, lenient } => cli::patterns::check(&file, lenient),
            PatternsCommands::List { patterns } => cli::patterns::list(patterns, &settings),
        },
        Commands::Feedback {
            number,
            ledger,
            patterns,
            accept,
            reject: _,
        } => cli::feedback::run(number, &ledger, &settings, patterns, accept),
    }
}
