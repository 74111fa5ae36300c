use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nntp_importer::config::{
    Config, Credentials, DEFAULT_NNTP_PORT, DEFAULT_STATUS_FILE, DownloaderConfig, ImporterConfig,
    RetryConfig, ServerConfig, interval_from_arg,
};

const AFTER_HELP: &str = "\
Example (NNTP server requires authentication):
  nntp-importer 192.168.1.99 nntp_downloads 15 news.eternal-september.org myusername mypassword nntp_downloads 10

Example (NNTP server does not require authentication):
  nntp-importer 192.168.1.99 nntp_downloads 15 news.another-provider.com nil nil nntp_downloads 10

Both examples run the importer every 15 minutes and the downloader every 10 minutes.
Paths are relative to the working directory unless absolute.";

#[derive(Parser, Debug)]
#[command(
    name = "nntp-importer",
    version,
    about = "Imports message files into an MBBS and downloads newsgroup articles from an NNTP server",
    after_help = AFTER_HELP
)]
struct Args {
    /// IP/hostname of the MBBS server
    mbbs_server: String,

    /// Directory scanned for message files to import
    import_dir: PathBuf,

    /// How often to run the importer, in minutes (default 5)
    importer_interval: String,

    /// IP/hostname of the NNTP server
    nntp_server: String,

    /// Username if required by the NNTP server, else nil
    username: String,

    /// Password if required by the NNTP server, else nil
    password: String,

    /// Directory downloaded articles are written to
    download_dir: PathBuf,

    /// How often to run the downloader, in minutes (default 5)
    downloader_interval: String,

    /// Newsgroup status file
    #[arg(long, default_value = DEFAULT_STATUS_FILE)]
    status_file: PathBuf,

    /// MBBS NNTP port
    #[arg(long, default_value_t = DEFAULT_NNTP_PORT)]
    mbbs_port: u16,

    /// Upstream NNTP port
    #[arg(long, default_value_t = DEFAULT_NNTP_PORT)]
    nntp_port: u16,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            importer: ImporterConfig {
                server: ServerConfig {
                    host: self.mbbs_server,
                    port: self.mbbs_port,
                },
                import_dir: self.import_dir,
                interval: interval_from_arg(&self.importer_interval),
            },
            downloader: DownloaderConfig {
                server: ServerConfig {
                    host: self.nntp_server,
                    port: self.nntp_port,
                },
                credentials: Credentials::from_args(&self.username, &self.password),
                download_dir: self.download_dir,
                status_file: self.status_file,
                interval: interval_from_arg(&self.downloader_interval),
            },
            retry: RetryConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match nntp_importer::run_until_signal(args.into_config()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Unrecoverable error occurred: {}", e);
            ExitCode::FAILURE
        }
    }
}
