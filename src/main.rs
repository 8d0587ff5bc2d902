use std::process::ExitCode;

use qyt::ui::output;

fn main() -> ExitCode {
    match qyt::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(output::format_error(&err));
            ExitCode::FAILURE
        }
    }
}
