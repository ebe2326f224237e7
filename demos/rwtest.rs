use std::process::ExitCode;
use synch::harness::{self, RwTestConfig};

pub fn main() -> ExitCode {
    let config = RwTestConfig::default();
    println!(
        "rwtest: {} writers x {}, {} readers x {}",
        config.writers, config.writer_iterations, config.readers, config.reader_iterations
    );

    match harness::rwtest(&config) {
        Ok(outcome) => {
            println!("{outcome}");
            if outcome.passed { ExitCode::SUCCESS } else { ExitCode::FAILURE }
        }
        Err(err) => {
            eprintln!("rwtest: {err}");
            ExitCode::FAILURE
        }
    }
}
