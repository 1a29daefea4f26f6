use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zipbrowse")]
#[command(version)]
#[command(about = "Browse and extract members of a remote ZIP archive", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipbrowse https://example.com/archive.zip              list member names\n  \
  zipbrowse -l https://example.com/archive.zip           list with sizes\n  \
  zipbrowse https://example.com/archive.zip docs/a.md    print one member\n  \
  zipbrowse -u bob -p secret https://host/r.zip x.txt -o x.txt")]
pub struct Cli {
    /// URL of the remote ZIP archive
    #[arg(value_name = "URL")]
    pub url: String,

    /// Member to extract (omit to list member names)
    #[arg(value_name = "MEMBER")]
    pub member: Option<String>,

    /// Write the extracted member to this path instead of stdout
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Username for HTTP Basic authentication
    #[arg(short = 'u', long = "user", value_name = "USER", requires = "password")]
    pub username: Option<String>,

    /// Password for HTTP Basic authentication
    #[arg(short = 'p', long = "password", value_name = "PASS", requires = "username")]
    pub password: Option<String>,

    /// Show uncompressed sizes in the listing
    #[arg(short = 'l', long = "long")]
    pub long: bool,
}
