use std::env;
use std::fs::File;
use std::io::{self, Read};
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Paths,
    Hex,
    Strings,
}

#[derive(Debug)]
struct CliConfig {
    mode: InputMode,
    inputs: Vec<String>,
}

fn print_help() {
    let help = "\
lfsperm_crc32c: compute CRC-32C checksums

USAGE:
    cargo run -p lfsperm-harness --bin lfsperm_crc32c -- [OPTIONS] [INPUT...]

Reads each path in turn, or stdin when no path is given ('-' also means
stdin). Output is one 8-digit lowercase hex checksum per input.

OPTIONS:
    -x, --hex       Treat inputs as one sequence of hex bytes
    -s, --string    Checksum each input as a UTF-8 string
    -h, --help      Show this help
";
    println!("{help}");
}

fn parse_args(args: &[String]) -> Result<CliConfig, String> {
    let mut config = CliConfig {
        mode: InputMode::Paths,
        inputs: Vec::new(),
    };
    for arg in args {
        match arg.as_str() {
            "-x" | "--hex" => config.mode = InputMode::Hex,
            "-s" | "--string" => config.mode = InputMode::Strings,
            "-h" | "--help" => {
                print_help();
                return Err(String::new());
            }
            "-" => config.inputs.push(arg.clone()),
            flag if flag.starts_with('-') => return Err(format!("unknown option: {flag}")),
            _ => config.inputs.push(arg.clone()),
        }
    }
    Ok(config)
}

fn parse_hex_byte(token: &str) -> Result<u8, String> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u8::from_str_radix(digits, 16).map_err(|_| format!("invalid hex byte: {token}"))
}

fn checksum_reader(reader: &mut dyn Read) -> io::Result<u32> {
    let mut crc = 0;
    let mut block = [0_u8; 8192];
    loop {
        let read = reader.read(&mut block)?;
        if read == 0 {
            return Ok(crc);
        }
        crc = crc32c::crc32c_append(crc, &block[..read]);
    }
}

fn checksum_path(path: &str) -> Result<u32, String> {
    let result = if path == "-" {
        checksum_reader(&mut io::stdin().lock())
    } else {
        File::open(path).and_then(|mut file| checksum_reader(&mut file))
    };
    result.map_err(|error| format!("{path}: {error}"))
}

fn run(args: &[String]) -> Result<(), String> {
    let config = parse_args(args)?;
    match config.mode {
        InputMode::Hex => {
            let bytes = config
                .inputs
                .iter()
                .map(|token| parse_hex_byte(token))
                .collect::<Result<Vec<u8>, String>>()?;
            println!("{:08x}", crc32c::crc32c(&bytes));
        }
        InputMode::Strings => {
            for input in &config.inputs {
                println!("{:08x}", crc32c::crc32c(input.as_bytes()));
            }
        }
        InputMode::Paths if config.inputs.is_empty() => {
            println!("{:08x}", checksum_path("-")?);
        }
        InputMode::Paths => {
            for path in &config.inputs {
                println!("{:08x}  {path}", checksum_path(path)?);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) if error.is_empty() => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("ERROR lfsperm_crc32c failed: {error}");
            ExitCode::from(2)
        }
    }
}
