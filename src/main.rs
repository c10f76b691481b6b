use dagr::cli;
use dagr::commands;

fn main() {
    let args = cli::parse();
    if let Err(err) = commands::run(args) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
