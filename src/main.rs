use std::env;
use std::fs;
use std::process;

use tracing_subscriber::EnvFilter;

use omr_inter::config::{self, Constants};
use omr_inter::text;

fn usage() -> ! {
    eprintln!("Usage: omr-inter chord <text>");
    eprintln!("       omr-inter metronome <text>");
    eprintln!("       omr-inter constants [overrides.yaml]");
    process::exit(1);
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
    }

    match args[1].as_str() {
        "chord" => {
            let Some(input) = args.get(2) else { usage() };
            match text::parse_chord_name(input) {
                Some(chord) => print_json(&chord),
                None => {
                    eprintln!("Not a chord name: {}", input);
                    process::exit(1);
                }
            }
        }
        "metronome" => {
            let Some(input) = args.get(2) else { usage() };
            let recognition = text::recognize(input, None, None, &config::defaults().metronome, false);
            print_json(&recognition);
            if !recognition.valid {
                process::exit(1);
            }
        }
        "constants" => {
            let constants = match args.get(2) {
                Some(path) => {
                    let content = match fs::read_to_string(path) {
                        Ok(content) => content,
                        Err(e) => {
                            eprintln!("Error reading file '{}': {}", path, e);
                            process::exit(1);
                        }
                    };
                    match Constants::from_yaml(&content) {
                        Ok(c) => c,
                        Err(e) => {
                            eprintln!("Error in '{}': {}", path, e);
                            process::exit(1);
                        }
                    }
                }
                None => config::defaults().clone(),
            };
            match constants.to_yaml() {
                Ok(yaml) => print!("{}", yaml),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            }
        }
        _ => usage(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
