use std::process::ExitCode;

fn main() -> ExitCode {
    match mud::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: "mud::process", %error, "server exited with an error");
            ExitCode::FAILURE
        }
    }
}
