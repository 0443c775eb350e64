use std::process::ExitCode;

fn main() -> ExitCode {
    ftzadjust_cli::run()
}
