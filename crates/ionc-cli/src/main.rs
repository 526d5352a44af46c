//! # ionc — membrane mechanism compiler
//!
//! Compiles `.ion` mechanism descriptions into a C++ header plus CPU
//! translation unit callable from a simulation host. See the `ionc-lang`
//! and `ionc-compiler` crates for the pipeline itself; this binary owns
//! argument parsing, file IO, logging, and diagnostics.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ionc_compiler::printable::PrintableMechanism;
use ionc_lang::ast::ParsedMechanism;

mod error;
use error::{CliError, CliResult};

#[derive(Parser, Debug)]
#[command(name = "ionc", version, about = "Compile membrane mechanism descriptions to C++")]
struct IoncCli {
    /// Input mechanism file
    input: PathBuf,

    /// Prefix for the output file names; emits `<prefix>.hpp` and
    /// `<prefix>_cpu.cpp`. Defaults to the input file's stem.
    #[arg(short, long)]
    output: Option<String>,

    /// Namespace for the generated code
    #[arg(short = 'N', long, default_value = "ionc")]
    namespace: String,

    /// Pretty-print the solved IR to stdout instead of emitting C++
    #[arg(long)]
    dump_ir: bool,

    /// Write a JSON summary of each mechanism's external interface
    #[arg(long)]
    interface_json: Option<PathBuf>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = IoncCli::parse();
    if let Err(err) = run(cli) {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn run(cli: IoncCli) -> CliResult<()> {
    let source = fs::read_to_string(&cli.input)?;
    let mechanisms = ionc_lang::parse_mechanisms(&source)?;
    if mechanisms.is_empty() {
        return Err(CliError::invalid_args(format!(
            "no mechanisms found in {}",
            cli.input.display()
        )));
    }

    if cli.dump_ir {
        for mech in &mechanisms {
            let solved = ionc_compiler::lower(mech)?;
            println!("{}", ionc_compiler::pretty::mechanism_to_string(&solved));
        }
        return Ok(());
    }

    let mut printables = Vec::with_capacity(mechanisms.len());
    for mech in &mechanisms {
        info!("compiling mechanism '{}'", mech.name);
        printables.push(ionc_compiler::compile(mech)?);
    }

    if let Some(path) = &cli.interface_json {
        let summary: Vec<InterfaceSummary> = mechanisms
            .iter()
            .zip(&printables)
            .map(|(m, p)| InterfaceSummary::new(m, p))
            .collect();
        fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        info!("wrote interface summary to {}", path.display());
    }

    let prefix = match &cli.output {
        Some(prefix) => prefix.clone(),
        None => cli
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| CliError::invalid_args("cannot derive an output prefix"))?,
    };

    let hpp_path = format!("{}.hpp", prefix);
    let cpp_path = format!("{}_cpu.cpp", prefix);
    let header_include = PathBuf::from(&hpp_path)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| hpp_path.clone());

    let mut hpp = String::new();
    let mut cpp = String::new();
    for p in &printables {
        hpp.push_str(&ionc_printer::print_header(p, &cli.namespace)?);
        hpp.push('\n');
        cpp.push_str(&ionc_printer::print_mechanism(p, &cli.namespace, &header_include)?);
        cpp.push('\n');
    }

    fs::write(&hpp_path, hpp)?;
    fs::write(&cpp_path, cpp)?;
    info!("wrote {} and {}", hpp_path, cpp_path);
    Ok(())
}

/// What the host needs to know about a compiled mechanism, for tooling.
#[derive(Serialize)]
struct InterfaceSummary {
    name: String,
    kind: String,
    parameters: Vec<String>,
    states: Vec<String>,
    bindings: Vec<BindingSummary>,
    effects: Vec<EffectSummary>,
}

#[derive(Serialize)]
struct BindingSummary {
    source: String,
    ion: Option<String>,
}

#[derive(Serialize)]
struct EffectSummary {
    target: String,
    ion: Option<String>,
}

impl InterfaceSummary {
    fn new(mech: &ParsedMechanism, printable: &PrintableMechanism) -> Self {
        Self {
            name: printable.name.clone(),
            kind: mech.kind.to_string(),
            parameters: printable.field_pack.param_sources.clone(),
            states: printable.field_pack.state_sources.clone(),
            bindings: printable
                .field_pack
                .bind_sources
                .iter()
                .map(|(kind, ion, _)| BindingSummary {
                    source: kind.name().to_string(),
                    ion: ion.clone(),
                })
                .collect(),
            effects: printable
                .field_pack
                .effect_sources
                .iter()
                .map(|(kind, ion, _)| EffectSummary {
                    target: kind.name().to_string(),
                    ion: ion.clone(),
                })
                .collect(),
        }
    }
}
