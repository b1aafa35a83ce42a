//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    pretty_env_logger::init();
    if let Err(err) = homearea_cli::run() {
        eprintln!("homearea: {err}");
        std::process::exit(1);
    }
}
