use clap::{Parser, Subcommand};

mod generate;
mod jobs;

#[derive(Debug, Parser)]
#[command(name = "copychef-cli")]
#[command(about = "Copychef command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Inspect scheduled bulk jobs and their generated content
    Jobs {
        #[command(subcommand)]
        command: jobs::JobsCommands,
    },
    /// Run a one-off bulk generation without a scheduled job
    Generate(generate::GenerateArgs),
    /// Database utilities
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Jobs { command }) => {
            let pool = copychef_db::connect_pool_from_env().await?;
            jobs::run(&pool, command).await
        }
        Some(Commands::Generate(args)) => generate::run(args).await,
        Some(Commands::Db { command }) => {
            let pool = copychef_db::connect_pool_from_env().await?;
            match command {
                DbCommands::Ping => {
                    copychef_db::ping(&pool).await?;
                    println!("database: ok");
                }
                DbCommands::Migrate => {
                    copychef_db::run_migrations(&pool).await?;
                    println!("migrations applied");
                }
            }
            Ok(())
        }
        None => {
            println!("copychef-cli: use --help for available commands");
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
