fn main() {
    if let Err(error) = taskflow::run() {
        eprintln!("taskflow: {error}");
        std::process::exit(1);
    }
}
