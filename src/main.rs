use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cfg = webauthn_authenticator::config::Config::parse();
    if cfg.rotate_key {
        return webauthn_authenticator::rotate_key(&cfg);
    }
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(webauthn_authenticator::run(cfg))
}
