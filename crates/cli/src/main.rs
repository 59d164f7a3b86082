use std::process::ExitCode;

fn main() -> ExitCode {
    pwyc_cli::run()
}
