//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Transfer files through a remote roothelper session")]
pub struct Cli {
    /// Configuration file (default: ~/.config/rhremote/client.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Local roothelper socket, overriding the configuration
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    /// Hide progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a session and print its fingerprint
    Connect {
        /// Remote roothelper host
        host: String,
    },

    /// Copy entries of a remote directory into a local directory
    Download {
        /// Remote roothelper host
        host: String,
        /// Directory on the remote host holding the entries
        remote_dir: String,
        /// Local destination directory
        local_dir: PathBuf,
        /// Entry names inside `remote_dir`
        #[arg(required = true)]
        names: Vec<String>,
        /// Replace local files that already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Stream local files to a remote directory
    Upload {
        /// Remote roothelper host
        host: String,
        /// Destination directory on the remote host
        remote_dir: String,
        /// Local files to send
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the effective configuration
    ShowConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_download() {
        let cli = Cli::parse_from([
            "rhremote", "download", "10.0.0.2", "/data", "/tmp/out", "a.txt", "b.txt",
        ]);
        match cli.command {
            Command::Download {
                host,
                remote_dir,
                names,
                overwrite,
                ..
            } => {
                assert_eq!(host, "10.0.0.2");
                assert_eq!(remote_dir, "/data");
                assert_eq!(names, vec!["a.txt", "b.txt"]);
                assert!(!overwrite);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn upload_requires_files() {
        assert!(Cli::try_parse_from(["rhremote", "upload", "h", "/dst"]).is_err());
    }

    #[test]
    fn global_socket_override() {
        let cli = Cli::parse_from(["rhremote", "connect", "h", "--socket", "/run/rh.sock"]);
        assert_eq!(cli.socket, Some(PathBuf::from("/run/rh.sock")));
    }

    #[test]
    fn command_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
