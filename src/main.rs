//! Command-line driver: list a remote archive's members or extract one.

use anyhow::{Result, bail};
use clap::Parser;
use std::io::Write;
use tracing_subscriber::EnvFilter;

use zipbrowse::{Cli, ZipBrowser};

#[tokio::main]
async fn main() -> Result<()> {
    // Silent unless `$RUST_LOG` asks for output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = ZipBrowser::builder(cli.url.as_str());
    if let (Some(username), Some(password)) = (&cli.username, &cli.password) {
        builder = builder.basic_auth(username, password);
    }
    let browser = builder.build().await?;

    match &cli.member {
        None => list_members(&browser, cli.long).await?,
        Some(member) => extract_member(&browser, member, cli.output.as_deref()).await?,
    }

    Ok(())
}

async fn list_members(browser: &ZipBrowser, long: bool) -> Result<()> {
    for name in browser.list().await? {
        if long {
            if let Some(entry) = browser.entry(&name)? {
                println!("{:>12}  {name}", entry.uncompressed_size);
            }
        } else {
            println!("{name}");
        }
    }
    Ok(())
}

async fn extract_member(
    browser: &ZipBrowser,
    member: &str,
    output: Option<&std::path::Path>,
) -> Result<()> {
    let Some(reader) = browser.get(member).await? else {
        bail!("member not found in archive: {member}");
    };
    let data = reader.read_to_vec()?;

    match output {
        Some(path) => tokio::fs::write(path, &data).await?,
        None => std::io::stdout().write_all(&data)?,
    }
    Ok(())
}
