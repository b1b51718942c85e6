use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use lfsperm_harness::{
    CasePlan, DefineOverride, DefineTable, GEOMETRIES, Geometry, IMPLICIT_DEFINE_NAMES, PermError,
    factorial, permutation, permutation_seed,
};

const PLAN_NAME: &str = "explore";

#[derive(Debug)]
enum Command {
    Resolve,
    ListGeometries,
    ListImplicit,
    Factorial(usize),
    ArrayPermutation { index: usize, size: usize },
}

#[derive(Debug)]
struct CliConfig {
    command: Command,
    geometries: String,
    overrides: Vec<DefineOverride>,
    permutation: usize,
    json: bool,
}

fn print_help() {
    let help = "\
lfsperm_explore: resolve implicit defines for one permutation index

USAGE:
    cargo run -p lfsperm-harness --bin lfsperm_explore -- [OPTIONS]

OPTIONS:
    --geometry <LIST>           Geometry presets, comma-separated (default: default)
    -D <NAME=VALUES>            Override a define; several values add a dimension
    --permutation <INDEX>       Combined permutation index (default: 0)
    --list-geometries           Print the geometry presets
    --list-implicit             Print the implicit define names and ids
    --factorial <N>             Print N!
    --array-permutation <I> <N> Print ordering I of 0..N
    --json                      Emit JSON instead of text
    -h, --help                  Show this help
";
    println!("{help}");
}

fn parse_usize(value: &str) -> Result<usize, String> {
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        usize::from_str_radix(hex, 16).map_err(|_| format!("invalid hex index: {value}"))
    } else {
        value
            .parse::<usize>()
            .map_err(|_| format!("invalid index: {value}"))
    }
}

fn describe(err: &PermError) -> String {
    match err.suggestion() {
        Some(hint) => format!("{err} ({hint})"),
        None => err.to_string(),
    }
}

fn next_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str, String> {
    *index += 1;
    args.get(*index)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn parse_args(args: &[String]) -> Result<CliConfig, String> {
    let mut config = CliConfig {
        command: Command::Resolve,
        geometries: "default".to_owned(),
        overrides: Vec::new(),
        permutation: 0,
        json: false,
    };

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--geometry" => {
                config.geometries = next_value(args, &mut index, "--geometry")?.to_owned();
            }
            "-D" | "--define" => {
                let spec = next_value(args, &mut index, "-D")?;
                config
                    .overrides
                    .push(spec.parse::<DefineOverride>().map_err(|err| describe(&err))?);
            }
            "--permutation" => {
                config.permutation = parse_usize(next_value(args, &mut index, "--permutation")?)?;
            }
            "--list-geometries" => config.command = Command::ListGeometries,
            "--list-implicit" => config.command = Command::ListImplicit,
            "--factorial" => {
                let n = parse_usize(next_value(args, &mut index, "--factorial")?)?;
                config.command = Command::Factorial(n);
            }
            "--array-permutation" => {
                let i = parse_usize(next_value(args, &mut index, "--array-permutation")?)?;
                let n = parse_usize(next_value(args, &mut index, "--array-permutation")?)?;
                config.command = Command::ArrayPermutation { index: i, size: n };
            }
            "--json" => config.json = true,
            "-h" | "--help" => {
                print_help();
                return Err(String::new());
            }
            unknown => return Err(format!("unknown option: {unknown}")),
        }
        index += 1;
    }

    Ok(config)
}

fn emit_json(value: &serde_json::Value) -> Result<(), String> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|error| format!("explore_json_serialize_failed: {error}"))?;
    println!("{payload}");
    Ok(())
}

fn list_geometries(json: bool) -> Result<(), String> {
    if json {
        let value = serde_json::to_value(GEOMETRIES)
            .map_err(|error| format!("explore_json_serialize_failed: {error}"))?;
        return emit_json(&value);
    }
    for geometry in GEOMETRIES {
        println!(
            "{:<8} read={:<5} prog={:<5} block={}",
            geometry.name, geometry.read_size, geometry.prog_size, geometry.block_size
        );
    }
    Ok(())
}

fn list_implicit(json: bool) -> Result<(), String> {
    if json {
        return emit_json(&serde_json::json!(IMPLICIT_DEFINE_NAMES));
    }
    for (id, name) in IMPLICIT_DEFINE_NAMES.iter().enumerate() {
        println!("{id:>2} {name}");
    }
    Ok(())
}

fn resolve(config: &CliConfig) -> Result<(), String> {
    let table = Arc::new(DefineTable::implicit());
    for ov in &config.overrides {
        table.require(&ov.name).map_err(|err| describe(&err))?;
    }
    let geometries = Geometry::parse_list(&config.geometries).map_err(|err| describe(&err))?;
    let plan = CasePlan::new(PLAN_NAME, table, &[], &geometries, &config.overrides)
        .map_err(|err| describe(&err))?;
    let p = config.permutation;
    let geometry = plan.geometry(p).map_err(|err| describe(&err))?;
    let mut defines = plan.define_set(p).map_err(|err| describe(&err))?;
    let values = defines.implicit_values().map_err(|err| describe(&err))?;
    let validation = defines
        .test_config()
        .and_then(|test_config| test_config.validate())
        .err()
        .map(|err| err.to_string());

    if config.json {
        let defines: serde_json::Map<String, serde_json::Value> = IMPLICIT_DEFINE_NAMES
            .iter()
            .zip(values)
            .map(|(name, value)| ((*name).to_owned(), serde_json::Value::from(value)))
            .collect();
        return emit_json(&serde_json::json!({
            "permutation": p,
            "count": plan.count(),
            "geometry": geometry.name,
            "seed": permutation_seed(PLAN_NAME, p),
            "defines": defines,
            "validation_error": validation,
        }));
    }

    println!(
        "permutation {p} of {} (geometry {})",
        plan.count(),
        geometry.name
    );
    for (name, value) in IMPLICIT_DEFINE_NAMES.iter().zip(values) {
        println!("  {name:<18} = {value}");
    }
    if let Some(error) = validation {
        println!("  invalid: {error}");
    }
    Ok(())
}

fn run(args: &[String]) -> Result<(), String> {
    let config = parse_args(args)?;
    match config.command {
        Command::Resolve => resolve(&config),
        Command::ListGeometries => list_geometries(config.json),
        Command::ListImplicit => list_implicit(config.json),
        Command::Factorial(n) => {
            let value = factorial(n).map_err(|err| describe(&err))?;
            println!("{value}");
            Ok(())
        }
        Command::ArrayPermutation { index, size } => {
            let ordering = permutation(index, size).map_err(|err| describe(&err))?;
            if config.json {
                return emit_json(&serde_json::json!(ordering));
            }
            let rendered: Vec<String> = ordering.iter().map(u32::to_string).collect();
            println!("{}", rendered.join(" "));
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) if error.is_empty() => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("ERROR lfsperm_explore failed: {error}");
            ExitCode::from(2)
        }
    }
}
