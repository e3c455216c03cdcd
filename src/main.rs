use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use log::info;

use ta_kripke::dict::BddDict;
use ta_kripke::explore::explore;
use ta_kripke::kripke::{DeadPolicy, Kripke, KripkeConfig};
use ta_kripke::model::Model;
use ta_kripke::semantics::ZoneSemantics;

#[derive(Debug, Parser)]
#[command(author, version, about = "Explore a timed-automaton system as a Kripke structure")]
struct Cli {
    /// System declaration to load.
    #[arg(value_name = "FILE")]
    model: PathBuf,

    /// Atomic proposition to observe (`NAME`, `NAME OP INT` or `PROC.LOC`).
    #[clap(short, long = "ap", value_name = "PROP")]
    aps: Vec<String>,

    /// Dead states: `false` (no successor), `true` (unlabeled loop) or the
    /// name of the proposition labelling their loop.
    #[clap(long, value_name = "VALUE", default_value = "true")]
    dead: String,

    /// Zone semantics of the engine.
    #[clap(long, value_name = "NAME", default_value = "elapsed_extraLUplus_local")]
    semantics: String,

    /// List the names usable in propositions and exit.
    #[clap(long)]
    vars: bool,

    /// Print the explored structure in GraphViz format.
    #[clap(short, long)]
    dot: bool,

    /// Suppress standard output.
    #[clap(short, long)]
    quiet: bool,

    /// Stop after this many states.
    #[clap(long, value_name = "INT")]
    max_states: Option<usize>,

    /// Increase log verbosity (repeatable).
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(args: Cli) -> color_eyre::Result<()> {
    let model = Model::load(&args.model).wrap_err_with(|| format!("cannot load {}", args.model.display()))?;
    let mut out = io::stdout().lock();

    if args.vars {
        model.dump_info(&mut out)?;
        out.flush()?;
        return Ok(());
    }

    let semantics: ZoneSemantics = args.semantics.parse()?;
    let dead: DeadPolicy = args.dead.parse()?;
    let config = KripkeConfig::default().with_semantics(semantics).with_dead(dead);
    let dict = Rc::new(BddDict::default());
    let model = Rc::new(model);
    let kripke = Kripke::new(model.clone(), args.aps.iter().map(String::as_str), dict, config)?;
    info!("kripke = {:?}", kripke);

    let time_explore = std::time::Instant::now();
    let exploration = explore(&kripke, args.max_states)?;
    info!("Explored in {:.3} s", time_explore.elapsed().as_secs_f64());

    if args.quiet {
        return Ok(());
    }
    if args.dot {
        write!(out, "{}", exploration.to_dot()?)?;
    } else {
        writeln!(out, "system: {}", model.name())?;
        writeln!(out, "semantics: {}", kripke.semantics())?;
        writeln!(out, "dead states: {}", kripke.dead_policy())?;
        writeln!(out, "discrete configurations (bound): {}", model.discrete_bound())?;
        writeln!(out, "states: {}", exploration.states.len())?;
        writeln!(out, "edges: {}", exploration.edges.len())?;
        writeln!(out, "dead: {}", exploration.num_dead())?;
        if exploration.truncated {
            writeln!(out, "exploration stopped after {} states", exploration.states.len())?;
        }
    }
    out.flush().wrap_err("error writing to standard output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("{:?}", e);
        return ExitCode::from(2);
    }

    let args = Cli::parse();

    let level = match args.verbose {
        0 => simplelog::LevelFilter::Warn,
        1 => simplelog::LevelFilter::Info,
        2 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    if let Err(e) = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("cannot install logger: {}", e);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:?}", e);
            ExitCode::from(2)
        }
    }
}
