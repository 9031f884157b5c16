fn main() {
    #[cfg(feature = "cli")]
    dyldtrie::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("dyldtrie: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
