use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use clap::{values_t, App, AppSettings, Arg};
use env_logger::{fmt, Builder, Target};
use log::{error, info, Level, LevelFilter, Record};

use fascicle::config::{SolverConfig, SolverConfigUpdate};
use fascicle::{Solution, Solver};
use fascicle_dimacs::parse_dimacs;

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{:#}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("FASCICLE_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn main_with_err() -> Result<i32, anyhow::Error> {
    let matches = App::new("fascicle")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::DisableHelpSubcommand)
        .arg_from_usage("[INPUT] 'The input file to use (stdin if omitted)'")
        .arg_from_usage("[seed] --seed=[N] 'Seed for all randomized choices (picked from the clock if omitted)'")
        .arg_from_usage("[config-file] --config=[FILE] 'Read parameters from a TOML configuration file'")
        .arg(
            Arg::from_usage("[config-option] -C --config-option")
                .value_name("OPTION>=<VALUE")
                .help("Specify a single configuration option")
                .multiple(true)
                .number_of_values(1),
        )
        .get_matches();

    init_logging();

    info!("This is fascicle {}", env!("CARGO_PKG_VERSION"));

    let mut config_update = SolverConfigUpdate::new();

    if let Some(config_path) = matches.value_of("config-file") {
        let mut config_contents = String::new();
        fs::File::open(config_path)
            .and_then(|mut file| file.read_to_string(&mut config_contents))
            .with_context(|| format!("failed to read configuration file '{}'", config_path))?;

        config_update.merge(toml::from_str(&config_contents)?);
    }

    for config_option in values_t!(matches, "config-option", String).unwrap_or_else(|_| vec![]) {
        config_update.merge(
            toml::from_str(&config_option)
                .with_context(|| format!("invalid configuration option '{}'", config_option))?,
        );
    }

    let mut config = SolverConfig::default();
    config_update.apply(&mut config);

    let seed = match matches.value_of("seed") {
        Some(seed) => seed
            .parse()
            .with_context(|| format!("invalid seed '{}'", seed))?,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(0),
    };
    info!("seed: {}", seed);

    let formula = match matches.value_of("INPUT") {
        Some(path) => {
            info!("reading file '{}'", path);
            let file = fs::File::open(path)
                .with_context(|| format!("failed to open input file '{}'", path))?;
            parse_dimacs(file)?
        }
        None => {
            info!("reading from stdin");
            let stdin = io::stdin();
            let locked_stdin = stdin.lock();
            parse_dimacs(locked_stdin)?
        }
    };

    info!(
        "parsed formula with {} variables and {} clauses",
        formula.var_count(),
        formula.len()
    );

    let mut solver = Solver::with_config(&formula, config, seed);

    match solver.solve() {
        Solution::Sat(_) => {
            println!("s SATISFIABLE");
            print!("v");
            for lit in solver.model().unwrap_or_default() {
                print!(" {}", lit);
            }
            println!(" 0");
            Ok(10)
        }
        Solution::Unsat => {
            println!("s UNSATISFIABLE");
            Ok(20)
        }
    }
}
