use clap::Parser;
use rsitrader::cli::{run, Cli};
use rsitrader::logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    run(cli)
}
