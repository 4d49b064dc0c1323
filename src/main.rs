fn main() -> anyhow::Result<()> {
    memoriae_cli::main()
}
