//! Driver for a single DSDT/SSDT blob (`spec.md` §6 "CLI surface").
//!
//! Loads the table, runs it through both evaluation passes, completes the
//! initial load (running the `_INI` bootstrap), then checks for a `\TSFI`
//! name: by convention in ACPI conformance suites, a table that wants to
//! report pass/fail leaves an integer there and the last failing test case
//! writes its own (non-zero) index into it. Exit code mirrors that check so
//! this binary doubles as a regression-test runner, not just a loader.

use std::path::PathBuf;
use std::process::ExitCode;

use aml::{Data, InterpreterConfig, State};
use clap::Parser;

#[derive(Parser)]
#[command(name = "aml-cli", about = "Load and evaluate a DSDT/SSDT table")]
struct Opt {
    /// Path to the raw AML table bytes (ACPI description header included)
    table: PathBuf,

    /// Treat a missing `_SB_`/`_GPE`/`_PR_`/`_TZ_`/`_SI_` _INI bootstrap as fine
    #[arg(long)]
    skip_init_bootstrap: bool,
}

fn main() -> ExitCode {
    let opt = Opt::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(&opt) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(true)` when the table loaded cleanly and `\TSFI` (if present)
/// reports no failing test case.
fn run(opt: &Opt) -> anyhow::Result<bool> {
    let bytes = std::fs::read(&opt.table)?;

    let config = InterpreterConfig {
        run_unconditional_init_bootstrap: !opt.skip_init_bootstrap,
        ..InterpreterConfig::default()
    };
    let mut state = State::new(config);
    state.load_table(bytes)?;
    state.finish_initial_load()?;

    Ok(tsfi_is_clean(&state))
}

/// `\TSFI` is absent in ordinary firmware tables; conformance tables define
/// it as a `Name` and have their test cases overwrite it with the index of
/// whichever one last failed, leaving it at zero when everything passed.
fn tsfi_is_clean(state: &State) -> bool {
    let Some(node) = state.namespace().get_absolute("\\TSFI") else {
        return true;
    };
    let Some(object) = node.borrow().object.borrow().clone() else {
        return true;
    };
    let value = match &object.borrow().kind {
        aml::object::ObjectKind::Name(data) => data.borrow().clone(),
        _ => return true,
    };
    match value {
        Data::Integer(0) => true,
        Data::Integer(failed_index) => {
            tracing::error!(%failed_index, "test case failure recorded in \\TSFI");
            false
        }
        other => {
            tracing::error!(value = ?other, "\\TSFI is not an integer");
            false
        }
    }
}
