//! CLI argument definitions using clap derive macros.

use clap::{ArgGroup, Parser};

/// Search a time-indexed archive and download the matching files.
///
/// Locators come either from the command line (one URL per positional
/// argument) or from a strftime URL pattern expanded over the time range.
#[derive(Parser, Debug)]
#[command(name = "dataretriever")]
#[command(author, version, about)]
#[command(group(ArgGroup::new("locators").required(true).args(["urls", "pattern"])))]
pub struct Args {
    /// Locator URLs to fetch as-is
    pub urls: Vec<String>,

    /// URL pattern with strftime tokens, e.g. https://host/%Y/%m/%d/img_%Y%m%d.fits
    #[arg(long)]
    pub pattern: Option<String>,

    /// Hours between generated locators (pattern mode, default 24)
    #[arg(long, requires = "pattern", value_parser = clap::value_parser!(u32).range(1..=8784))]
    pub step_hours: Option<u32>,

    /// Start of the time range (e.g. 2020-01-01 or "2020-01-01 06:00")
    #[arg(long)]
    pub start: String,

    /// End of the time range
    #[arg(long)]
    pub end: String,

    /// Instrument constraint
    #[arg(long)]
    pub instrument: Option<String>,

    /// Source (observatory) constraint
    #[arg(long)]
    pub source: Option<String>,

    /// Data provider constraint
    #[arg(long)]
    pub provider: Option<String>,

    /// Observed physical quantity constraint
    #[arg(long)]
    pub physobs: Option<String>,

    /// Wavelength as MIN or MIN:MAX
    #[arg(long, value_parser = parse_wavelength)]
    pub wavelength: Option<WavelengthArg>,

    /// Output directory or path template (e.g. "./data/{instrument}/{file}")
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Search only; do not download
    #[arg(long)]
    pub dry_run: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Maximum concurrent downloads (1-100; unbounded when unset)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// A wavelength bound pair from `--wavelength`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavelengthArg {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

fn parse_wavelength(value: &str) -> Result<WavelengthArg, String> {
    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .map_err(|_| format!("'{part}' is not a number"))
    };
    let (min, max) = match value.split_once(':') {
        Some((min, max)) => (parse(min)?, parse(max)?),
        None => {
            let single = parse(value)?;
            (single, single)
        }
    };
    if !min.is_finite() || !max.is_finite() {
        return Err("wavelength bounds must be finite".to_string());
    }
    Ok(WavelengthArg { min, max })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TIME: [&str; 4] = ["--start", "2020-01-01", "--end", "2020-01-02"];

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec!["dataretriever"];
        argv.extend(TIME);
        argv.extend(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_cli_urls_parse_successfully() {
        let args = parse(&["https://h/a.fits", "https://h/b.fits"]).unwrap();
        assert_eq!(args.urls, vec!["https://h/a.fits", "https://h/b.fits"]);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.concurrency.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn test_cli_requires_locators() {
        let err = parse(&[]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_urls_and_pattern_conflict() {
        let err = parse(&["https://h/a.fits", "--pattern", "https://h/%Y.fits"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_requires_time_range() {
        let result = Args::try_parse_from(["dataretriever", "https://h/a.fits"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_step_hours_requires_pattern() {
        let err = parse(&["https://h/a.fits", "--step-hours", "6"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let args = parse(&["--pattern", "https://h/%Y%m%d%H.fits", "--step-hours", "6"]).unwrap();
        assert_eq!(args.step_hours, Some(6));
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = parse(&["https://h/a.fits", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = parse(&["https://h/a.fits", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = parse(&["https://h/a.fits", "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        assert_eq!(parse(&["https://h/a", "-c", "1"]).unwrap().concurrency, Some(1));
        assert_eq!(parse(&["https://h/a", "-c", "100"]).unwrap().concurrency, Some(100));
        assert_eq!(
            parse(&["https://h/a", "-c", "0"]).unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
        assert_eq!(
            parse(&["https://h/a", "-c", "101"]).unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
    }

    #[test]
    fn test_cli_wavelength_forms() {
        let args = parse(&["https://h/a", "--wavelength", "171"]).unwrap();
        assert_eq!(args.wavelength, Some(WavelengthArg { min: 171.0, max: 171.0 }));

        let args = parse(&["https://h/a", "--wavelength", "171:304"]).unwrap();
        assert_eq!(args.wavelength, Some(WavelengthArg { min: 171.0, max: 304.0 }));

        let err = parse(&["https://h/a", "--wavelength", "blue"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["dataretriever", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["dataretriever", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = parse(&["--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
