use std::io::Write;
use std::process::ExitCode;

use investiq_lib::output::{ConsoleIO, StdIO};
use investiq_lib::runtime::Runtime;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = investiq_cli::logging::init() {
        eprintln!("warning: {e}");
    }

    let args: Vec<String> = std::env::args().collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let mut io = StdIO::new();

    match investiq_cli::try_run_with_loader(&args, Runtime::from_env, &mut io).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
                clap_err.exit();
            }
            let _ = writeln!(io.stderr(), "Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
