fn main() {
    keel::cli::run();
}
