//! # catalog-index CLI
//!
//! Command-line interface for the catalog indexer.
//!
//! ## Usage
//! ```bash
//! catalog-index scan /jobs/show/shot010/renders --granularity sequence
//! catalog-index scan /jobs/show/scenes --filter "layout --wip" --output json
//! ```

mod cli;

use catalog_indexer::Result;

fn main() -> Result<()> {
    cli::run()
}
