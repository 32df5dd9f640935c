use clap::Parser;
use gantry_cli::Args;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = Args::parse();

    let default_filter = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout().lock();
    let code = gantry_cli::run(&args, &mut stdout);
    std::process::exit(code);
}
