use std::process::ExitCode;

fn main() -> ExitCode {
    match backtalkd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("backtalkd: {error}");
            ExitCode::FAILURE
        }
    }
}
