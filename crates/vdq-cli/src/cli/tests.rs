//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;

fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn add_with_defaults() {
    match parse(&["vdq", "add", "https://example.com/e1.mp4"]) {
        CliCommand::Add {
            url,
            id,
            dest,
            name,
            season,
            episode,
        } => {
            assert_eq!(url, "https://example.com/e1.mp4");
            assert!(id.is_none());
            assert!(dest.is_none());
            assert!(name.is_none());
            assert!(season.is_none());
            assert!(episode.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn add_with_episode_metadata() {
    match parse(&[
        "vdq",
        "add",
        "https://example.com/e2.mp4",
        "--id",
        "42",
        "--name",
        "Pilot",
        "--season",
        "1",
        "--episode",
        "2",
    ]) {
        CliCommand::Add {
            id,
            name,
            season,
            episode,
            ..
        } => {
            assert_eq!(id, Some(42));
            assert_eq!(name.as_deref(), Some("Pilot"));
            assert_eq!(season, Some(1));
            assert_eq!(episode, Some(2));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn run_replay_defaults_to_one() {
    match parse(&["vdq", "run"]) {
        CliCommand::Run { replay, jobs } => {
            assert_eq!(replay, 1);
            assert!(jobs.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn run_replay_zero_and_jobs_override() {
    match parse(&["vdq", "run", "--replay", "0", "--jobs", "4"]) {
        CliCommand::Run { replay, jobs } => {
            assert_eq!(replay, 0);
            assert_eq!(jobs, Some(4));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn id_commands_take_an_id() {
    assert!(matches!(
        parse(&["vdq", "pause", "7"]),
        CliCommand::Pause { id: 7 }
    ));
    assert!(matches!(
        parse(&["vdq", "resume", "7"]),
        CliCommand::Resume { id: 7 }
    ));
    assert!(matches!(
        parse(&["vdq", "stop", "7"]),
        CliCommand::Stop { id: 7 }
    ));
    assert!(matches!(
        parse(&["vdq", "remove", "7"]),
        CliCommand::Remove { id: 7 }
    ));
}

#[test]
fn missing_id_is_a_parse_error() {
    assert!(Cli::try_parse_from(["vdq", "pause"]).is_err());
    assert!(Cli::try_parse_from(["vdq", "run", "--replay"]).is_err());
}
