use clap::Parser;
use taskflow::cli::Cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = taskflow::commands::run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
