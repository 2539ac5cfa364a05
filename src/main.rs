fn main() -> color_eyre::Result<()> {
    injector::cli::main()
}
