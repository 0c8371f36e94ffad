use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use badgegate::{Command, Config, Console, FileStorage, Gate, MemoryStorage, Storage};

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = badgegate::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        badgegate::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }

    let storage: Box<dyn Storage> = if config.storage.in_memory {
        Box::new(MemoryStorage::new())
    } else {
        match FileStorage::open(&config.storage.data_dir) {
            Ok(storage) => Box::new(storage),
            Err(e) => {
                error!(error = %e, dir = %config.storage.data_dir, "Failed to open data directory");
                std::process::exit(1);
            }
        }
    };

    let gate = match Gate::open(&config, storage) {
        Ok(gate) => gate,
        Err(e) => {
            error!(error = %e, "Failed to load stored data");
            std::process::exit(1);
        }
    };

    info!("BadgeGate - badge login console");
    let (mut console, mut timer_rx) = Console::new(gate, &config);
    println!("BadgeGate. Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "Failed to read input");
                        break;
                    }
                };
                match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => print_lines(&console.handle(command)),
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
            Some(event) = timer_rx.recv() => {
                print_lines(&console.on_timer(event));
            }
        }
    }

    print_lines(&console.shutdown());
    info!("BadgeGate stopped");
}
