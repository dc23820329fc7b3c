//! Command-line voting station.
//!
//! Each invocation is one step of the voting flow: enroll voters, then for
//! each person at the booth capture a face image and cast, and finally
//! print the tally.

use std::path::{Path, PathBuf};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{error, info};
use thiserror::Error;

use facevote::{
    capture::FileCapture,
    logging,
    matcher::Matcher,
    model::{
        ballot::BallotBox,
        candidate_totals,
        db::Store,
        voter::{NewVoter, Registry, TemplateRef},
    },
    session::{AuthOutcome, Booth, CastOutcome},
    verifier::CommandVerifier,
    Config,
};

const PROGRAM_NAME: &str = "facevote";

const ABOUT_TEXT: &str = "Face-verified voting station: one vote per recognised voter.

EXIT CODES:
     0: Success.
   255: Ran successfully, but the vote was refused
        (face not recognised, already voted, or unknown candidate).
 Other: Error.";

const CONFIG: &str = "CONFIG";
const DATABASE: &str = "DATABASE";
const LOG_CONFIG: &str = "LOG_CONFIG";
const NAME: &str = "NAME";
const TEMPLATE: &str = "TEMPLATE";
const PROBE: &str = "PROBE";
const CANDIDATE: &str = "CANDIDATE";
const JSON: &str = "JSON";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    let probe = Arg::new(PROBE)
        .help("Path to the captured face image")
        .value_parser(value_parser!(PathBuf))
        .required(true);

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .arg(
            Arg::new(CONFIG)
                .long("config")
                .help("Config file")
                .value_parser(value_parser!(PathBuf))
                .default_value(facevote::config::CONFIG_PATH)
                .global(true),
        )
        .arg(
            Arg::new(DATABASE)
                .long("database")
                .help("Database file, overriding the config")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new(LOG_CONFIG)
                .long("log-config")
                .help("log4rs config file")
                .value_parser(value_parser!(PathBuf))
                .default_value("log4rs.yaml")
                .global(true),
        )
        .subcommand(
            Command::new("enroll")
                .about("Enroll a voter with a reference face image")
                .arg(Arg::new(NAME).required(true))
                .arg(
                    Arg::new(TEMPLATE)
                        .value_parser(value_parser!(PathBuf))
                        .required(true),
                ),
        )
        .subcommand(Command::new("voters").about("List enrolled voters in match order"))
        .subcommand(Command::new("candidates").about("List the candidates on the ballot"))
        .subcommand(
            Command::new("identify")
                .about("Report who a face image belongs to, without voting")
                .arg(probe.clone()),
        )
        .subcommand(
            Command::new("vote")
                .about("Authenticate a face image and cast that voter's vote")
                .arg(probe)
                .arg(Arg::new(CANDIDATE).required(true)),
        )
        .subcommand(
            Command::new("tally")
                .about("Print the vote counts and the winner")
                .arg(
                    Arg::new(JSON)
                        .long("json")
                        .help("Print the report as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] figment::Error),
    #[error(transparent)]
    Core(#[from] facevote::Error),
    #[error("No `verifier_command` configured")]
    NoVerifier,
    #[error("Could not encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Whether the requested action went through.
#[derive(Debug, Eq, PartialEq)]
enum Outcome {
    Done,
    Refused,
}

fn load_config(args: &ArgMatches) -> Result<Config, Error> {
    // Global args with defaults are always present.
    let path = args
        .get_one::<PathBuf>(CONFIG)
        .map(PathBuf::as_path)
        .unwrap_or_else(|| Path::new(facevote::config::CONFIG_PATH));
    let mut config = Config::load(path)?;
    if let Some(database) = args.get_one::<PathBuf>(DATABASE) {
        config.set_database(database);
    }
    Ok(config)
}

fn booth(
    config: &Config,
    store: Store,
    probe: &Path,
) -> Result<Booth<FileCapture, CommandVerifier>, Error> {
    let verifier = CommandVerifier::new(config.verifier_command()).ok_or(Error::NoVerifier)?;
    let matcher = Matcher::new(
        Registry::new(store.clone()),
        verifier,
        config.verify_timeout(),
    );
    Ok(Booth::new(
        FileCapture::new(probe),
        matcher,
        BallotBox::new(store, config.candidates().clone()),
        config.session_ttl(),
    ))
}

/// Carry out the requested subcommand.
async fn execute(args: &ArgMatches) -> Result<Outcome, Error> {
    let config = load_config(args)?;
    let store = Store::open(config.database())?;

    match args.subcommand() {
        Some(("enroll", sub)) => {
            // Required arguments are guaranteed to be present.
            let name: &String = sub.get_one(NAME).unwrap();
            let template: &PathBuf = sub.get_one(TEMPLATE).unwrap();
            let voter = Registry::new(store)
                .enroll(NewVoter::new(name.as_str(), TemplateRef::new(template)))?;
            println!("Enrolled {} as voter {}", voter.name, voter.id);
            Ok(Outcome::Done)
        }
        Some(("voters", _)) => {
            for voter in Registry::new(store).list_all()? {
                println!("{}: {} ({})", voter.id, voter.name, voter.template);
            }
            Ok(Outcome::Done)
        }
        Some(("candidates", _)) => {
            for candidate in config.candidates().iter() {
                match &candidate.symbol {
                    Some(symbol) => println!("{} (Symbol: {symbol})", candidate.name),
                    None => println!("{}", candidate.name),
                }
                if let Some(description) = &candidate.description {
                    println!("    {description}");
                }
            }
            Ok(Outcome::Done)
        }
        Some(("identify", sub)) => {
            let probe: &PathBuf = sub.get_one(PROBE).unwrap();
            let outcome = booth(&config, store, probe)?.authenticate().await?;
            println!("{outcome}");
            Ok(match outcome {
                AuthOutcome::Authenticated(_) => Outcome::Done,
                AuthOutcome::NotRecognized => Outcome::Refused,
            })
        }
        Some(("vote", sub)) => {
            let probe: &PathBuf = sub.get_one(PROBE).unwrap();
            let candidate: &String = sub.get_one(CANDIDATE).unwrap();
            let booth = booth(&config, store, probe)?;

            let session = match booth.authenticate().await? {
                AuthOutcome::Authenticated(session) => session,
                outcome @ AuthOutcome::NotRecognized => {
                    println!("{outcome}");
                    return Ok(Outcome::Refused);
                }
            };
            println!("{}", AuthOutcome::Authenticated(session.clone()));

            match booth.cast(&session, candidate) {
                Ok(outcome) => {
                    println!("{outcome}");
                    Ok(match outcome {
                        CastOutcome::Accepted(_) => Outcome::Done,
                        CastOutcome::AlreadyVoted => Outcome::Refused,
                    })
                }
                Err(facevote::Error::UnknownCandidate(name)) => {
                    println!("There is no candidate called {name}.");
                    Ok(Outcome::Refused)
                }
                Err(e) => Err(e.into()),
            }
        }
        Some(("tally", sub)) => {
            let ballots = BallotBox::new(store, config.candidates().clone());
            let report = candidate_totals::aggregate(&ballots)?;
            if sub.get_flag(JSON) {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
            Ok(Outcome::Done)
        }
        // `subcommand_required` rules this out.
        _ => unreachable!("no subcommand"),
    }
}

/// Run the subcommand, report any error, and return the exit code.
async fn run(args: &ArgMatches) -> u8 {
    match execute(args).await {
        Ok(Outcome::Done) => 0,
        Ok(Outcome::Refused) => 255,
        Err(err) => {
            error!("{err}");
            println!("Error: {err}");
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let args = cli().get_matches();

    // Set up logging.
    let log_config = args
        .get_one::<PathBuf>(LOG_CONFIG)
        .map(PathBuf::as_path)
        .unwrap_or_else(|| Path::new("log4rs.yaml"));
    logging::init(log_config);
    info!("Initialised logging");

    let exit_code = run(&args).await;
    std::process::exit(exit_code.into())
}
