fn main() -> anyhow::Result<()> {
    rusty_plate::cli::run()
}
