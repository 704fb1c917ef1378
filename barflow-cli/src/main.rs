use anyhow::Result;
use barflow_cli::app;

fn main() -> Result<()> {
    app::run()
}
