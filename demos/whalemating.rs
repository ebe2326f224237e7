use std::process::ExitCode;
use synch::harness::{self, WhaleConfig};

pub fn main() -> ExitCode {
    let config = WhaleConfig::default();
    println!("whalemating: {} whales of each role", config.per_role);

    match harness::whalemating(&config) {
        Ok(outcome) => {
            println!("{outcome}");
            if outcome.passed { ExitCode::SUCCESS } else { ExitCode::FAILURE }
        }
        Err(err) => {
            eprintln!("whalemating: {err}");
            ExitCode::FAILURE
        }
    }
}
