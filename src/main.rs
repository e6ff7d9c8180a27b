fn main() {
    cpt_pipeline::cli::run();
}
