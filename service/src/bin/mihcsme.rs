//! MIHCSME command-line interface
//!
//! This binary provides the `mihcsme` command-line tool for converting
//! MIHCSME metadata between workbooks, documents and annotation stores.

use clap::Parser;
use mihcsme_service::cli::{Cli, CliApp};

fn main() -> anyhow::Result<()> {
    let app = CliApp::new(Cli::parse())?;
    app.init_tracing();
    if !app.run()? {
        std::process::exit(1);
    }
    Ok(())
}
