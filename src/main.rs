fn main() {
    if let Err(e) = proofhub_lib::run() {
        eprintln!("proofhub: {e}");
        std::process::exit(1);
    }
}
