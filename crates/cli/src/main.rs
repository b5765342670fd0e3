use std::process::ExitCode;

fn main() -> ExitCode {
    pairadox_cli::run()
}
