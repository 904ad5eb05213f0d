use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["finsent", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["finsent", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["finsent"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn run_defaults_leave_overrides_unset() {
    let cli = Cli::try_parse_from(["finsent", "run"]).unwrap();
    let Some(Commands::Run(args)) = cli.command else {
        panic!("expected run command");
    };
    assert!(args.models.sentiment_models.is_none());
    assert!(args.models.ner_models.is_none());
    assert!(args.batch_size.is_none());
    assert!(args.delay_ms.is_none());
    assert!(args.rerun_policy.is_none());
    assert!(!args.dry_run);
}

#[test]
fn run_accepts_every_override() {
    let cli = Cli::try_parse_from([
        "finsent",
        "run",
        "--sentiment-models",
        "finbert,lexicon",
        "--ner-models",
        "bert-large-ner",
        "--batch-size",
        "8",
        "--delay-ms",
        "250",
        "--rerun-policy",
        "upsert",
        "--dry-run",
    ])
    .unwrap();
    let Some(Commands::Run(args)) = cli.command else {
        panic!("expected run command");
    };
    assert_eq!(args.models.sentiment_models.as_deref(), Some("finbert,lexicon"));
    assert_eq!(args.models.ner_models.as_deref(), Some("bert-large-ner"));
    assert_eq!(args.batch_size, Some(8));
    assert_eq!(args.delay_ms, Some(250));
    assert_eq!(args.rerun_policy, Some(RerunPolicy::Upsert));
    assert!(args.dry_run);
}

#[test]
fn run_rejects_unknown_rerun_policy() {
    let result = Cli::try_parse_from(["finsent", "run", "--rerun-policy", "replace"]);
    assert!(result.is_err());
}

#[test]
fn analyze_requires_text() {
    assert!(Cli::try_parse_from(["finsent", "analyze"]).is_err());

    let cli = Cli::try_parse_from(["finsent", "analyze", "--text", "Acme beats estimates"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Analyze { ref text, .. }) if text == "Acme beats estimates"
    ));
}

#[test]
fn status_limit_defaults_to_twenty() {
    let cli = Cli::try_parse_from(["finsent", "status"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Status { limit: 20 })));
}
