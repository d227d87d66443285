fn main() -> anyhow::Result<()> {
    nyra_lib::run()
}
