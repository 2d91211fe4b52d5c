use std::process::ExitCode;

fn main() -> ExitCode {
    landquote_cli::run()
}
