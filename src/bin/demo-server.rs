use anyhow::Result;
use demo_server::cli;

// No #[tokio::main]: `start` may fork, and the runtime is built afterwards.
fn main() -> Result<()> {
    let action = cli::start()?;

    action.execute()
}
