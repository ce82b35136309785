fn main() {
    if let Err(e) = devflow::run_cli() {
        eprintln!("Error: {e:#}");
        std::process::exit(devflow::exit_code(&e));
    }
}
