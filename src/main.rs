use std::{
    io::{self, Write},
    process::ExitCode,
};

use bucketfs::{
    util::object::{parse_bucket_from_uri, parse_provider_from_uri},
    Config, FilesystemError, ObjectClient, ObjectFS, StorageAttributes, Visibility,
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use thiserror::Error;
use tracing::{error, info, span, Instrument, Level, Span};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

fn path_arg(name: &'static str) -> Arg {
    Arg::new(name).required(true)
}

fn cli() -> Command {
    Command::new("bucketfs")
        .about("Filesystem operations over an object-store bucket")
        .arg(
            Arg::new("BUCKET_URI")
                .required(true)
                .help("s3://bucket or gs://bucket"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("ls")
                .about("List a directory")
                .arg(Arg::new("PATH"))
                .arg(
                    Arg::new("recursive")
                        .short('r')
                        .long("recursive")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("cat").about("Print a file").arg(path_arg("PATH")))
        .subcommand(
            Command::new("put")
                .about("Upload a local file, or stdin when FILE is omitted")
                .arg(path_arg("PATH"))
                .arg(Arg::new("FILE"))
                .arg(
                    Arg::new("public")
                        .long("public")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("private"),
                )
                .arg(Arg::new("private").long("private").action(ArgAction::SetTrue)),
        )
        .subcommand(Command::new("rm").about("Delete a file").arg(path_arg("PATH")))
        .subcommand(
            Command::new("rmdir")
                .about("Delete a directory and everything under it")
                .arg(path_arg("PATH")),
        )
        .subcommand(Command::new("mkdir").about("Create a directory").arg(path_arg("PATH")))
        .subcommand(
            Command::new("cp")
                .about("Copy a file")
                .arg(path_arg("SRC"))
                .arg(path_arg("DST")),
        )
        .subcommand(
            Command::new("mv")
                .about("Move a file")
                .arg(path_arg("SRC"))
                .arg(path_arg("DST")),
        )
        .subcommand(Command::new("stat").about("Show file metadata").arg(path_arg("PATH")))
        .subcommand(
            Command::new("visibility")
                .about("Show or set file visibility")
                .arg(path_arg("PATH"))
                .arg(Arg::new("VISIBILITY").value_parser(["public", "private"])),
        )
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, CliError> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| CliError::Usage(format!("missing argument: {}", name)))
}

fn parse_visibility(value: &str) -> Result<Visibility, CliError> {
    value.parse().map_err(CliError::Usage)
}

fn run(fs: &ObjectFS, matches: &ArgMatches) -> Result<(), CliError> {
    let mut out = io::stdout().lock();

    match matches.subcommand() {
        Some(("ls", sub)) => {
            let path = sub.get_one::<String>("PATH").map_or("", String::as_str);
            for entry in fs.list_contents(path, sub.get_flag("recursive")) {
                match entry? {
                    StorageAttributes::Directory(dir) => writeln!(out, "d {:>12} {}/", "-", dir.path)?,
                    StorageAttributes::File(file) => {
                        let size = file.file_size.map_or("-".to_string(), |s| s.to_string());
                        writeln!(out, "- {:>12} {}", size, file.path)?
                    }
                }
            }
        }
        Some(("cat", sub)) => {
            let mut stream = fs.read_stream(arg(sub, "PATH")?)?;
            io::copy(&mut stream, &mut out)?;
        }
        Some(("put", sub)) => {
            let mut config = Config::new();
            if sub.get_flag("public") {
                config = config.with_visibility(Visibility::Public);
            } else if sub.get_flag("private") {
                config = config.with_visibility(Visibility::Private);
            }

            let path = arg(sub, "PATH")?;
            match sub.get_one::<String>("FILE") {
                Some(file) => fs.write(path, &std::fs::read(file)?, &config)?,
                None => fs.write_stream(path, &mut io::stdin().lock(), &config)?,
            }
        }
        Some(("rm", sub)) => fs.delete(arg(sub, "PATH")?)?,
        Some(("rmdir", sub)) => fs.delete_directory(arg(sub, "PATH")?)?,
        Some(("mkdir", sub)) => fs.create_directory(arg(sub, "PATH")?, &Config::new())?,
        Some(("cp", sub)) => fs.copy(arg(sub, "SRC")?, arg(sub, "DST")?, &Config::new())?,
        Some(("mv", sub)) => fs.move_file(arg(sub, "SRC")?, arg(sub, "DST")?, &Config::new())?,
        Some(("stat", sub)) => {
            let path = arg(sub, "PATH")?;
            let size = fs.file_size(path)?.file_size;
            let modified = fs.last_modified(path)?.last_modified;
            // objects uploaded without a content type are still stat-able
            let mime = fs.mime_type(path).ok().and_then(|a| a.mime_type);
            let visibility = fs.visibility(path)?.visibility;

            writeln!(out, "path:          {}", path)?;
            writeln!(out, "size:          {}", size.unwrap_or_default())?;
            writeln!(out, "last_modified: {}", modified.unwrap_or_default())?;
            writeln!(out, "mime_type:     {}", mime.as_deref().unwrap_or("-"))?;
            writeln!(
                out,
                "visibility:    {}",
                visibility.map_or("-".to_string(), |v| v.to_string())
            )?;
        }
        Some(("visibility", sub)) => {
            let path = arg(sub, "PATH")?;
            match sub.get_one::<String>("VISIBILITY") {
                Some(value) => fs.set_visibility(path, parse_visibility(value)?)?,
                None => {
                    let attributes = fs.visibility(path)?;
                    let visibility = attributes.visibility.map_or("-".to_string(), |v| v.to_string());
                    writeln!(out, "{}", visibility)?;
                }
            }
        }
        Some((other, _)) => return Err(CliError::Usage(format!("unknown command: {}", other))),
        None => return Err(CliError::Usage("missing command".to_string())),
    }

    out.flush()?;
    Ok(())
}

async fn client_for(bucket_uri: &str) -> Result<Box<dyn ObjectClient>, CliError> {
    let provider = parse_provider_from_uri(bucket_uri)
        .map_err(|err| CliError::Usage(err.to_string()))?;

    if provider.is_aws() {
        let config = aws_config::load_from_env().await;
        return Ok(Box::new(aws_sdk_s3::Client::new(&config)));
    }

    let config = google_cloud_storage::client::ClientConfig::default()
        .with_auth()
        .await
        .map_err(|err| CliError::Usage(format!("failed to authenticate with gcs: {}", err)))?;
    Ok(Box::new(google_cloud_storage::client::Client::new(config)))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().json().init();

    let span = span!(Level::INFO, "main", context = "main");
    execute().instrument(span).await
}

async fn execute() -> ExitCode {
    info!("called");

    let matches = cli().get_matches();
    let bucket_uri = match arg(&matches, "BUCKET_URI") {
        Ok(uri) => uri.to_string(),
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    let bucket = parse_bucket_from_uri(&bucket_uri).to_string();
    info!(bucket = bucket.as_str(), "args");

    let client = match client_for(&bucket_uri).await {
        Ok(client) => client,
        Err(err) => {
            error!(error_message=%err, error_group="client");
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    // ObjectFS blocks on the SDK futures, so it runs off the async workers.
    let fs = ObjectFS::new(client, &bucket);
    match dispatch(fs, matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error_message=%err, error_group="command");
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

/// Runs the command on a blocking thread inside the caller's span.
async fn dispatch(fs: ObjectFS, matches: ArgMatches) -> Result<(), CliError> {
    let span = Span::current();
    tokio::task::spawn_blocking(move || {
        let _e = span.enter();
        run(&fs, &matches)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use bucketfs::adapters::memory::MemoryClient;

    use super::*;

    const BUCKET: &str = "dummy-bucket";

    fn parse_args(args: &[&str]) -> ArgMatches {
        let argv = ["bucketfs", "s3://dummy-bucket"].iter().chain(args);
        cli().try_get_matches_from(argv).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispatch_runs_in_span() {
        let client = MemoryClient::new();
        let fs = ObjectFS::new(Box::new(client.clone()), BUCKET);

        dispatch(fs, parse_args(&["mkdir", "dir"]))
            .instrument(span!(Level::INFO, "main", context = "main"))
            .await
            .unwrap();

        assert_eq!(client.keys(BUCKET), vec!["dir/"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispatch_reports_command_errors() {
        let fs = ObjectFS::new(Box::new(MemoryClient::new()), BUCKET);

        let err = dispatch(fs, parse_args(&["cat", "missing.txt"])).await.unwrap_err();

        assert!(matches!(
            err,
            CliError::Filesystem(FilesystemError::UnableToRead { .. })
        ));
    }

    #[test]
    fn test_cli_rejects_conflicting_visibility() {
        let argv = ["bucketfs", "s3://b", "put", "a.txt", "--public", "--private"];

        assert!(cli().try_get_matches_from(argv).is_err());
    }
}
