fn main() {
    if let Err(err) = mermaid_canvas::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
