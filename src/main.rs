//! otelscope CLI entry point.

use otelscope_lib::cli::{self, Cli};
use otelscope_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
