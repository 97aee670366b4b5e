fn main() -> anyhow::Result<()> {
    vitaltwin_lib::run()
}
