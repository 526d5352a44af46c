//! End-to-end CLI tests: compile the example mechanisms, exercise the
//! failure modes, and check the developer aids.

use assert_cmd::Command;
use predicates::prelude::*;
use std::error::Error;
use std::path::PathBuf;
use tempfile::tempdir;

fn mechanism_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../mechanisms").join(name)
}

#[test]
fn compiles_the_passive_channel() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let prefix = tmp.path().join("pas");
    let prefix_str = prefix.to_str().expect("utf8");

    let mut cmd = Command::cargo_bin("ionc")?;
    cmd.args([
        mechanism_path("pas.ion").to_str().expect("utf8"),
        "-o",
        prefix_str,
        "-N",
        "cat",
    ]);
    cmd.assert().success();

    let hpp = std::fs::read_to_string(tmp.path().join("pas.hpp"))?;
    let cpp = std::fs::read_to_string(tmp.path().join("pas_cpu.cpp"))?;
    assert!(hpp.contains("namespace cat {"));
    assert!(hpp.contains("struct pas_pack {"));
    assert!(cpp.contains("void compute_currents(pas_pack& pp)"));
    Ok(())
}

#[test]
fn compiles_the_gated_channel_with_a_solved_evolve() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let prefix = tmp.path().join("kd");

    let mut cmd = Command::cargo_bin("ionc")?;
    cmd.args([
        mechanism_path("kd.ion").to_str().expect("utf8"),
        "-o",
        prefix.to_str().expect("utf8"),
    ]);
    cmd.assert().success();

    let cpp = std::fs::read_to_string(tmp.path().join("kd_cpu.cpp"))?;
    // the solver's closed form reads dt and calls exp
    assert!(cpp.contains("pp._pp_dt[i]"));
    assert!(cpp.contains("std::exp("));
    assert!(cpp.contains("pp._pp_n[i] ="));
    Ok(())
}

#[test]
fn compiles_the_record_state_synapse() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let prefix = tmp.path().join("exp2syn");

    let mut cmd = Command::cargo_bin("ionc")?;
    cmd.args([
        mechanism_path("exp2syn.ion").to_str().expect("utf8"),
        "-o",
        prefix.to_str().expect("utf8"),
    ]);
    cmd.assert().success();

    let hpp = std::fs::read_to_string(tmp.path().join("exp2syn.hpp"))?;
    // the record state flattens into one pointer per field
    assert!(hpp.contains("_pp_s_a"));
    assert!(hpp.contains("_pp_s_b"));
    Ok(())
}

#[test]
fn missing_input_fails() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("ionc")?;
    cmd.arg("does-not-exist.ion");
    cmd.assert().failure().stderr(predicate::str::contains("IO error"));
    Ok(())
}

#[test]
fn parse_errors_abort_with_a_location() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let bad = tmp.path().join("bad.ion");
    std::fs::write(&bad, "density broken { parameter = 1.0; }")?;

    let mut cmd = Command::cargo_bin("ionc")?;
    cmd.arg(bad.to_str().expect("utf8"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("parse error").and(predicate::str::contains("line 1")));
    Ok(())
}

#[test]
fn type_errors_abort() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let bad = tmp.path().join("bad.ion");
    std::fs::write(&bad, "density broken { parameter a = 2 [mV] + 3 [ms]; }")?;

    let mut cmd = Command::cargo_bin("ionc")?;
    cmd.arg(bad.to_str().expect("utf8"));
    cmd.assert().failure().stderr(predicate::str::contains("type error"));
    Ok(())
}

#[test]
fn recursive_functions_abort() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let bad = tmp.path().join("rec.ion");
    std::fs::write(
        &bad,
        "density rec { function f(x: real) : real { f(x) } parameter p = f(1.0); }",
    )?;

    let mut cmd = Command::cargo_bin("ionc")?;
    cmd.arg(bad.to_str().expect("utf8"));
    cmd.assert().failure().stderr(predicate::str::contains("recursive function 'f'"));
    Ok(())
}

#[test]
fn dump_ir_prints_the_solved_mechanism() -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("ionc")?;
    cmd.args([mechanism_path("kd.ion").to_str().expect("utf8"), "--dump-ir"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("density kd {").and(predicate::str::contains("evolve n'")));
    Ok(())
}

#[test]
fn interface_json_lists_the_external_surface() -> Result<(), Box<dyn Error>> {
    let tmp = tempdir()?;
    let json_path = tmp.path().join("kd.json");
    let prefix = tmp.path().join("kd");

    let mut cmd = Command::cargo_bin("ionc")?;
    cmd.args([
        mechanism_path("kd.ion").to_str().expect("utf8"),
        "-o",
        prefix.to_str().expect("utf8"),
        "--interface-json",
        json_path.to_str().expect("utf8"),
    ]);
    cmd.assert().success();

    let summary: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path)?)?;
    assert_eq!(summary[0]["name"], "kd");
    assert_eq!(summary[0]["kind"], "density");
    assert_eq!(summary[0]["states"][0], "n");
    assert_eq!(summary[0]["bindings"][0]["ion"], "k");
    Ok(())
}
