// These Clippy lints are disabled because this is a CLI binary, not a library:
// - print_stderr: the error of a failed command is reported on stderr.
// - exit: Calling `std::process::exit()` is standard for CLI apps to signal failure to the shell.
#![allow(clippy::print_stderr, clippy::exit)]

#[tokio::main]
async fn main() {
    if let Err(e) = fitfmt_cli::cli::run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
