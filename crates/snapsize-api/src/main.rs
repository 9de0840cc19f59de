use snapsize_core::Config;

// Use mimalloc as the global allocator; variant buffers churn through large
// allocations and the system allocator fragments under that load.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (_state, router) = snapsize_api::setup::initialize_app(config.clone()).await?;

    snapsize_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
