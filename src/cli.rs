//! Command-line parsing
//!
//! Arguments can also come from an args file (`--args <FILE>`): one or more
//! lines of arguments, `#` comment lines ignored, double quotes grouping
//! words. Arguments from the file are applied first so anything given on
//! the command line overrides them.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

/// Resolved command-line options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// G-code program to rewrite
    pub source: Option<PathBuf>,
    /// Enable debug logging
    pub verbose: bool,
    /// Args file the options were (partly) loaded from
    pub args_file: Option<PathBuf>,
}

/// Build the clap command
pub fn command() -> Command {
    Command::new("estlknet")
        .version(crate::LONG_VERSION)
        .about("EstlKnet - G-Code massager for happier outcomes")
        .args_override_self(true)
        .arg(
            Arg::new("source")
                .help("Path to the G-code file to rewrite")
                .value_name("SOURCE")
                .value_parser(value_parser!(PathBuf))
                .num_args(1..)
                .action(ArgAction::Append)
                .index(1),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("args")
                .long("args")
                .value_name("FILE")
                .help("Read additional arguments from FILE")
                .value_parser(value_parser!(PathBuf)),
        )
}

fn options_from(matches: &ArgMatches) -> CliOptions {
    CliOptions {
        source: matches
            .get_many::<PathBuf>("source")
            .and_then(|sources| sources.last())
            .cloned(),
        verbose: matches.get_flag("verbose"),
        args_file: matches.get_one::<PathBuf>("args").cloned(),
    }
}

/// Parse a full argv (program name first), expanding `--args` files.
///
/// # Errors
/// Returns the clap error for invalid arguments (including `--help` and
/// `--version` requests) or an error if the args file cannot be read.
pub fn parse_args<I, T>(argv: I) -> Result<CliOptions>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    let first = command().try_get_matches_from(&argv)?;
    let options = options_from(&first);

    let Some(args_file) = options.args_file.clone() else {
        return Ok(options);
    };

    let file_args = load_args_file(&args_file)?;
    let mut combined: Vec<OsString> = argv.iter().take(1).cloned().collect();
    combined.extend(file_args.into_iter().map(OsString::from));
    combined.extend(argv.iter().skip(1).cloned());

    let matches = command()
        .try_get_matches_from(&combined)
        .with_context(|| format!("Invalid arguments in {}", args_file.display()))?;
    Ok(CliOptions {
        args_file: Some(args_file),
        ..options_from(&matches)
    })
}

/// Read the arguments stored in an args file
pub fn load_args_file(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read args file {}", path.display()))?;
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join(" ");
    Ok(split_with_quotes(&joined))
}

/// Split on whitespace outside double quotes, dropping the quotes.
pub fn split_with_quotes(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_with_quotes() {
        assert_eq!(
            split_with_quotes(r#"-v  "my jobs/sign.gcode" x"#),
            vec!["-v", "my jobs/sign.gcode", "x"]
        );
        assert!(split_with_quotes("   ").is_empty());
        assert_eq!(split_with_quotes(r#"a"b c"d"#), vec!["ab cd"]);
    }

    #[test]
    fn test_parse_plain_args() {
        let options = parse_args(["estlknet", "-v", "job.gcode"]).unwrap();
        assert_eq!(options.source, Some(PathBuf::from("job.gcode")));
        assert!(options.verbose);
        assert_eq!(options.args_file, None);
    }

    #[test]
    fn test_source_is_optional_for_clap() {
        let options = parse_args(["estlknet"]).unwrap();
        assert_eq!(options, CliOptions::default());
    }

    #[test]
    fn test_last_source_wins() {
        let options = parse_args(["estlknet", "a.nc", "b.nc"]).unwrap();
        assert_eq!(options.source, Some(PathBuf::from("b.nc")));
    }

    #[test]
    fn test_help_is_a_clap_error() {
        let err = parse_args(["estlknet", "--help"]).unwrap_err();
        let clap_err = err.downcast_ref::<clap::Error>().unwrap();
        assert_eq!(clap_err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_missing_args_file() {
        let err = parse_args(["estlknet", "--args", "/no/such/args.txt"]).unwrap_err();
        assert!(err.to_string().contains("Failed to read args file"));
    }

    #[test]
    fn test_args_file_supplies_source_and_flags() {
        let dir = TempDir::new().unwrap();
        let args_path = dir.path().join("knet.args");
        fs::write(
            &args_path,
            "# default job\n  -v\n\"my jobs/sign.gcode\"\n# --verbose is already on\n",
        )
        .unwrap();

        let args_arg = args_path.to_string_lossy().into_owned();
        let options = parse_args(["estlknet", "--args", args_arg.as_str()]).unwrap();

        assert_eq!(options.source, Some(PathBuf::from("my jobs/sign.gcode")));
        assert!(options.verbose);
        assert_eq!(options.args_file, Some(args_path));
    }

    #[test]
    fn test_command_line_overrides_args_file() {
        let dir = TempDir::new().unwrap();
        let args_path = dir.path().join("knet.args");
        fs::write(&args_path, "from_file.gcode\n").unwrap();

        let args_arg = args_path.to_string_lossy().into_owned();
        let options =
            parse_args(["estlknet", "--args", args_arg.as_str(), "from_cli.gcode"]).unwrap();

        assert_eq!(options.source, Some(PathBuf::from("from_cli.gcode")));
        assert!(!options.verbose);
    }
}
