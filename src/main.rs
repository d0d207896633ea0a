// src/main.rs

use std::env;
use std::io::{self, Write};

use log::{info, warn};

use tempoql::config::JobConf;
use tempoql::engine::Engine;
use tempoql::error::DbResult;

fn open_engine() -> DbResult<Engine> {
    match env::args().nth(1) {
        Some(path) => {
            let conf = JobConf::load(&path)?;
            info!("loaded job configuration from {}", path);
            Ok(Engine::with_conf(conf))
        }
        None => Ok(Engine::new()),
    }
}

fn main() -> io::Result<()> {
    env_logger::init();
    info!("tempoql v0.1. Type .exit to quit.");

    let mut engine = match open_engine() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("cannot start: {}", e);
            std::process::exit(1);
        }
    };

    loop {
        print!("tempoql> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break; // EOF
        }
        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case(".exit") || trimmed.eq_ignore_ascii_case("exit") {
            break;
        }

        match engine.execute(trimmed) {
            Ok(output) => {
                println!("{}", output.header.join(" | "));
                for row in output.rows {
                    let vals: Vec<String> = row.iter().map(|v| v.to_string_value()).collect();
                    println!("{}", vals.join(" | "));
                }
            }
            Err(e) => warn!("{}", e),
        }
    }
    Ok(())
}
