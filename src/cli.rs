use sightline_core::classifier::{PipelineConfig, DEFAULT_CONFIG_FILE};
use sightline_core::{default_extensions, ThreadingMode};
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const USAGE: &str = "\
Usage:
  sightline classify <image>... [options]
  sightline scan <dir> [--output=PATH] [--no-thread] [options]
  sightline init-config [PATH] [--force]

Options:
  --config=PATH      configuration file (default: search for sightline.toml)
  --model=PATH       model file, overrides the configuration
  --labels=PATH      label file, overrides the configuration
  --side=N           model input side in pixels
  --top=N            maximum number of results per image
  --threshold=F      minimum confidence, exclusive
  --no-accelerator   ask the engine not to use a hardware accelerator
  -h, --help         print this help
  -V, --version      print the version

Set RUST_LOG to control log output (default: sightline=info).";

#[derive(Debug, PartialEq)]
pub enum Command {
    Classify(ClassifyConfig),
    Scan(ScanCliConfig),
    InitConfig(InitConfig),
}

/// Settings shared by every command that builds a classifier.
#[derive(Debug, Default, PartialEq)]
pub struct PipelineOverrides {
    pub config: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub labels: Option<PathBuf>,
    pub side: Option<u32>,
    pub top: Option<usize>,
    pub threshold: Option<f32>,
    pub accelerator: Option<bool>,
}

#[derive(Debug, PartialEq)]
pub struct ClassifyConfig {
    pub images: Vec<PathBuf>,
    pub overrides: PipelineOverrides,
}

#[derive(Debug, PartialEq)]
pub struct ScanCliConfig {
    pub root: PathBuf,
    pub output: Option<PathBuf>,
    pub threading: ThreadingMode,
    pub extensions: Vec<String>,
    pub overrides: PipelineOverrides,
}

#[derive(Debug, PartialEq, Eq)]
pub struct InitConfig {
    pub path: PathBuf,
    pub force: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CliError {
    Help,
    Version,
    MissingCommand,
    UnknownCommand(String),
    MissingImage,
    MissingRoot,
    InvalidFlag(String),
    InvalidValue { flag: String, value: String },
}

impl Command {
    pub fn from_env() -> Result<Self, CliError> {
        Self::from_iter(env::args().skip(1))
    }

    pub fn from_iter<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        if args.iter().any(|arg| arg == "--help" || arg == "-h") {
            return Err(CliError::Help);
        }
        if args.iter().any(|arg| arg == "--version" || arg == "-V") {
            return Err(CliError::Version);
        }

        let mut args = args.into_iter();
        match args.next().as_deref() {
            Some("classify") => ClassifyConfig::parse(args).map(Command::Classify),
            Some("scan") => ScanCliConfig::parse(args).map(Command::Scan),
            Some("init-config") => InitConfig::parse(args).map(Command::InitConfig),
            Some(other) => Err(CliError::UnknownCommand(other.to_string())),
            None => Err(CliError::MissingCommand),
        }
    }
}

impl PipelineOverrides {
    /// Consume `arg` if it is a pipeline flag. Returns `Ok(false)` for
    /// anything else.
    fn accept(&mut self, arg: &str) -> Result<bool, CliError> {
        if let Some(value) = arg.strip_prefix("--config=") {
            self.config = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--model=") {
            self.model = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--labels=") {
            self.labels = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--side=") {
            self.side = Some(parse_value("--side", value)?);
        } else if let Some(value) = arg.strip_prefix("--top=") {
            self.top = Some(parse_value("--top", value)?);
        } else if let Some(value) = arg.strip_prefix("--threshold=") {
            self.threshold = Some(parse_value("--threshold", value)?);
        } else if arg == "--no-accelerator" {
            self.accelerator = Some(false);
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    /// Apply the numeric overrides on top of a loaded pipeline configuration.
    pub fn apply(&self, mut pipeline: PipelineConfig) -> PipelineConfig {
        if let Some(side) = self.side {
            pipeline.input_side = side;
        }
        if let Some(top) = self.top {
            pipeline = pipeline.with_max_results(top);
        }
        if let Some(threshold) = self.threshold {
            pipeline = pipeline.with_confidence_threshold(threshold);
        }
        if let Some(enabled) = self.accelerator {
            pipeline = pipeline.with_accelerator(enabled);
        }
        pipeline
    }
}

impl ClassifyConfig {
    fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: Iterator<Item = String>,
    {
        let mut images = Vec::new();
        let mut overrides = PipelineOverrides::default();

        for arg in args {
            if arg.starts_with("--") {
                if overrides.accept(&arg)? {
                    continue;
                }
                return Err(CliError::InvalidFlag(arg));
            }
            images.push(PathBuf::from(arg));
        }

        if images.is_empty() {
            return Err(CliError::MissingImage);
        }

        Ok(Self { images, overrides })
    }
}

impl ScanCliConfig {
    fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: Iterator<Item = String>,
    {
        let mut root: Option<PathBuf> = None;
        let mut output: Option<PathBuf> = None;
        let mut threading = ThreadingMode::Parallel;
        let mut overrides = PipelineOverrides::default();

        for arg in args {
            if arg.starts_with("--") {
                if arg == "--no-thread" {
                    threading = ThreadingMode::Sequential;
                    continue;
                }
                if let Some(value) = arg.strip_prefix("--root=") {
                    root = Some(PathBuf::from(value));
                    continue;
                }
                if let Some(value) = arg.strip_prefix("--output=") {
                    output = Some(PathBuf::from(value));
                    continue;
                }
                if overrides.accept(&arg)? {
                    continue;
                }
                return Err(CliError::InvalidFlag(arg));
            }

            if root.is_none() {
                root = Some(PathBuf::from(&arg));
                continue;
            }

            if output.is_none() {
                output = Some(PathBuf::from(&arg));
                continue;
            }

            return Err(CliError::InvalidFlag(arg));
        }

        let root = root.ok_or(CliError::MissingRoot)?;

        Ok(Self {
            root,
            output,
            threading,
            extensions: default_extensions(),
            overrides,
        })
    }
}

impl InitConfig {
    fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: Iterator<Item = String>,
    {
        let mut path: Option<PathBuf> = None;
        let mut force = false;

        for arg in args {
            if arg == "--force" {
                force = true;
                continue;
            }
            if arg.starts_with("--") || path.is_some() {
                return Err(CliError::InvalidFlag(arg));
            }
            path = Some(PathBuf::from(arg));
        }

        Ok(Self {
            path: path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
            force,
        })
    }
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Help => write!(f, "{}", USAGE),
            Self::Version => write!(f, "sightline {}", env!("CARGO_PKG_VERSION")),
            Self::MissingCommand => write!(f, "a command is required\n\n{}", USAGE),
            Self::UnknownCommand(command) => write!(f, "unknown command: {}\n\n{}", command, USAGE),
            Self::MissingImage => write!(f, "at least one image argument is required"),
            Self::MissingRoot => write!(f, "root directory argument is required"),
            Self::InvalidFlag(flag) => write!(f, "unrecognized argument: {}", flag),
            Self::InvalidValue { flag, value } => {
                write!(f, "invalid value for {}: {}", flag, value)
            }
        }
    }
}

impl Error for CliError {}
