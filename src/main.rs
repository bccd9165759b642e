use std::process::ExitCode;

use env_logger::Env;

fn main() -> ExitCode {
    // `.env` may set RUST_LOG, so it is read before the logger starts.
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match exo_vet::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
