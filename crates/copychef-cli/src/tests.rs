use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["copychef-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["copychef-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["copychef-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_jobs_list_command() {
    let cli =
        Cli::try_parse_from(["copychef-cli", "jobs", "list"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Jobs {
            command: jobs::JobsCommands::List
        })
    ));
}

#[test]
fn jobs_content_defaults_to_all_jobs() {
    let cli =
        Cli::try_parse_from(["copychef-cli", "jobs", "content"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Jobs {
            command: jobs::JobsCommands::Content {
                job: None,
                limit: 20
            }
        })
    ));
}

#[test]
fn jobs_content_accepts_job_filter() {
    let cli = Cli::try_parse_from(["copychef-cli", "jobs", "content", "--job", "7", "--limit", "5"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Jobs {
            command: jobs::JobsCommands::Content {
                job: Some(7),
                limit: 5
            }
        })
    ));
}

#[test]
fn generate_collects_repeated_flags() {
    let cli = Cli::try_parse_from([
        "copychef-cli",
        "generate",
        "--niche",
        "air fryer",
        "--niche",
        "meal prep",
        "--platform",
        "tiktok",
        "--model",
        "claude-sonnet-4",
        "--dry-run",
    ])
    .expect("expected valid cli args");

    let Some(Commands::Generate(args)) = cli.command else {
        panic!("expected generate command");
    };
    assert_eq!(args.niches, vec!["air fryer", "meal prep"]);
    assert_eq!(args.platforms, vec!["tiktok"]);
    assert_eq!(args.models, vec!["claude-sonnet-4"]);
    assert_eq!(args.tones, vec!["friendly"], "tone falls back to its default");
    assert!(args.dry_run);
    assert!(!args.save);
}

#[test]
fn generate_requires_a_niche() {
    let result = Cli::try_parse_from([
        "copychef-cli",
        "generate",
        "--platform",
        "tiktok",
        "--model",
        "gpt-4o",
    ]);
    assert!(result.is_err(), "--niche is required");
}
