// src/main.rs

use dataflow_transfer::{cli, run};

fn main() {
    if let Err(err) = run_main() {
        eprintln!("dataflow-transfer error: {err}");
        std::process::exit(1);
    }
}

fn run_main() -> dataflow_transfer::errors::Result<()> {
    let args = cli::parse();
    run(args)
}
