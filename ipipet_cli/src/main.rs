//! # ipipet_cli
//!
//! Part of the iPipet crate family.
//!
//! Command line access to plating designs: parse a plating CSV, store it as a design, and
//! get back everything the run page needs to guide the pipetting.
//!
//! ## Use
//!
//! ```bash
//! ipipet_cli -c ipipet.yaml new
//! ipipet_cli parse pooling.csv --plate-type 96
//! ipipet_cli -c ipipet.yaml create pooling.csv --description "Pool 3" --plate-type 96 --pipet-type single
//! ipipet_cli -c ipipet.yaml data <id>
//! ```
use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use libipipet::config::Config;
use libipipet::design::{DesignId, DesignRequest};
use libipipet::plate::PlateGeometry;
use libipipet::plating::{OptionalFields, ParserOptions, PlatingParser};
use libipipet::run_options::RunOptions;
use libipipet::store::DesignStore;

const DEFAULT_CONFIG_PATH: &str = "ipipet.yaml";

type CliResult = Result<(), Box<dyn Error>>;

fn make_template_config(path: &Path) -> CliResult {
    Config::default().write_config_file(path)?;
    Ok(())
}

fn id_arg() -> Arg {
    Arg::new("id").required(true).help("Id of a stored design")
}

fn plate_type_arg() -> Arg {
    Arg::new("plate_type")
        .long("plate-type")
        .required(true)
        .value_parser(["96", "384"])
        .help("Number of wells on the plate")
}

fn cli() -> Command {
    Command::new("ipipet_cli")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .default_value(DEFAULT_CONFIG_PATH)
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Print debug messages"),
        )
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("parse")
                .about("Parse a plating CSV and print its steps")
                .arg(Arg::new("file").required(true).help("Path to the CSV"))
                .arg(plate_type_arg())
                .arg(
                    Arg::new("fields")
                        .long("fields")
                        .default_value("all")
                        .value_parser(["none", "volume", "all"])
                        .help("Which optional columns to read"),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Store a plating CSV as a new design")
                .arg(Arg::new("file").required(true).help("Path to the CSV"))
                .arg(
                    Arg::new("description")
                        .short('d')
                        .long("description")
                        .required(true),
                )
                .arg(plate_type_arg())
                .arg(
                    Arg::new("pipet_type")
                        .long("pipet-type")
                        .default_value("single")
                        .help("single or multi8"),
                )
                .arg(Arg::new("email").short('e').long("email"))
                .arg(
                    Arg::new("share")
                        .long("share")
                        .action(ArgAction::SetTrue)
                        .help("Add the design to the community list"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print the summary of a design")
                .arg(id_arg()),
        )
        .subcommand(
            Command::new("data")
                .about("Print the steps of a design")
                .arg(id_arg()),
        )
        .subcommand(
            Command::new("csv")
                .about("Write the original CSV of a design")
                .arg(id_arg())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Output file; defaults to <id>.csv"),
                ),
        )
        .subcommand(Command::new("community").about("List the shared designs"))
        .subcommand(
            Command::new("run")
                .about("Print the display settings for pipetting a design")
                .arg(id_arg())
                .arg(Arg::new("dpi").long("dpi"))
                .arg(Arg::new("well_color").long("well-color"))
                .arg(Arg::new("handedness").long("handedness")),
        )
        .subcommand(Command::new("verify").about("Parse every stored design again"))
}

fn get_id(matches: &ArgMatches) -> Result<DesignId, Box<dyn Error>> {
    let id = matches.get_one::<String>("id").map(String::as_str).unwrap_or_default();
    Ok(DesignId::parse(id)?)
}

fn get_geometry(matches: &ArgMatches) -> Result<PlateGeometry, Box<dyn Error>> {
    let plate_type = matches
        .get_one::<String>("plate_type")
        .map(String::as_str)
        .unwrap_or_default();
    Ok(plate_type.parse()?)
}

fn parse_file(matches: &ArgMatches) -> CliResult {
    let path = PathBuf::from(matches.get_one::<String>("file").ok_or("missing file")?);
    let optional_fields = match matches.get_one::<String>("fields").map(String::as_str) {
        Some("none") => OptionalFields::None,
        Some("volume") => OptionalFields::Volume,
        _ => OptionalFields::VolumeAndSpecimen,
    };
    let parser = PlatingParser::new(ParserOptions {
        geometry: get_geometry(matches)?,
        optional_fields,
    });
    log::info!("Parsing {}...", path.to_string_lossy());
    let run = parser.parse(File::open(&path)?)?;
    log::info!("Found {} steps.", run.len());
    println!("{}", run.to_json_payload()?);
    Ok(())
}

fn create_design(store: &DesignStore, matches: &ArgMatches) -> CliResult {
    let get = |name: &str| {
        matches
            .get_one::<String>(name)
            .cloned()
            .unwrap_or_default()
    };
    let path = PathBuf::from(get("file"));
    let request = DesignRequest {
        email: get("email"),
        description: get("description"),
        pipet_type: get("pipet_type"),
        plate_type: get("plate_type"),
        share_design: matches.get_flag("share"),
    };
    let csv_bytes = std::fs::read(&path)?;
    let info = store.create(&request, &csv_bytes)?;
    log::info!("Created design {} with {} steps.", info.id, info.numsteps);
    println!("{}", info.id);
    println!("{}", store.design_link(&info.id));
    Ok(())
}

fn write_csv(store: &DesignStore, matches: &ArgMatches) -> CliResult {
    let id = get_id(matches)?;
    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("{id}.csv")));
    let mut file = File::create(&output)?;
    file.write_all(&store.csv_bytes(&id)?)?;
    log::info!("Wrote {}", output.to_string_lossy());
    Ok(())
}

fn show_run(store: &DesignStore, matches: &ArgMatches) -> CliResult {
    let id = get_id(matches)?;
    let get = |name: &str| matches.get_one::<String>(name).map(String::as_str);
    let options = RunOptions::from_params(get("dpi"), get("well_color"), get("handedness"));
    let run = store.load_run(&id)?;
    let info = store.load_info(&id)?;
    let settings = serde_json::json!({
        "id": id,
        "description": info.description,
        "plate_type": info.plate_type,
        "pipet_type": info.pipet_type,
        "numsteps": run.len(),
        "options": options,
    });
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn verify_designs(store: &DesignStore, pb_manager: &MultiProgress) -> CliResult {
    let ids = store.list_ids()?;
    log::info!("Verifying {} designs...", ids.len());
    let pb = pb_manager.add(ProgressBar::new(ids.len() as u64));
    let mut n_failed = 0;
    for id in ids.iter() {
        match store.load_run(id) {
            Ok(run) => log::debug!("Design {id} has {} steps", run.len()),
            Err(e) => {
                n_failed += 1;
                log::error!("Design {id} failed: {e}");
            }
        }
        pb.inc(1);
    }
    pb.finish();
    log::info!("{} of {} designs parsed successfully.", ids.len() - n_failed, ids.len());
    Ok(())
}

fn run_command(matches: &ArgMatches, pb_manager: &MultiProgress) -> CliResult {
    let config_path = PathBuf::from(
        matches
            .get_one::<String>("config")
            .map(String::as_str)
            .unwrap_or(DEFAULT_CONFIG_PATH),
    );

    // Commands that need no configuration
    match matches.subcommand() {
        Some(("new", _)) => {
            log::info!(
                "Making a template config at {}...",
                config_path.to_string_lossy()
            );
            make_template_config(&config_path)?;
            log::info!("Done.");
            return Ok(());
        }
        Some(("parse", sub)) => return parse_file(sub),
        _ => (),
    }

    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = Config::read_config_file(&config_path)?;
    log::debug!("Upload Path: {}", config.upload_path.to_string_lossy());
    let store = DesignStore::new(&config)?;

    match matches.subcommand() {
        Some(("create", sub)) => create_design(&store, sub),
        Some(("show", sub)) => {
            let info = store.load_info(&get_id(sub)?)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
        Some(("data", sub)) => {
            println!("{}", store.data_payload(&get_id(sub)?)?);
            Ok(())
        }
        Some(("csv", sub)) => write_csv(&store, sub),
        Some(("community", _)) => {
            println!("{}", serde_yaml::to_string(&store.community())?);
            Ok(())
        }
        Some(("run", sub)) => show_run(&store, sub),
        Some(("verify", _)) => verify_designs(&store, pb_manager),
        _ => Err("no command given".into()),
    }
}

fn main() {
    let matches = cli().get_matches();

    // Initialize feedback. Logs go to stderr so stdout only carries results
    let level = if matches.get_flag("verbose") {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let logger = simplelog::TermLogger::new(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    if let Err(e) = run_command(&matches, &pb_manager) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let matches = cli()
            .try_get_matches_from(["ipipet_cli", "parse", "file.csv", "--plate-type", "384"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "parse");
        assert_eq!(get_geometry(sub).unwrap(), PlateGeometry::Wells384);
        assert!(cli()
            .try_get_matches_from(["ipipet_cli", "parse", "file.csv", "--plate-type", "48"])
            .is_err());
    }
}
