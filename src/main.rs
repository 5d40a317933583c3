fn main() -> anyhow::Result<()> {
    captcha_collector_lib::run()
}
