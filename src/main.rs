mod cli;

use cli::{ClassifyConfig, Command, InitConfig, PipelineOverrides, ScanCliConfig};
use sightline_core::{
    count_entries, create_report, init_ort_runtime, print_recognitions, print_results, progress,
    scan, write_json, Classifier, ClassifierConfig, ClassifierError, OrtEngine, ScanConfig,
};
use std::process;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sightline=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = Command::from_env().unwrap_or_else(|err| match err {
        cli::CliError::Help | cli::CliError::Version => {
            println!("{}", err);
            process::exit(0);
        }
        _ => {
            eprintln!("{}", err);
            process::exit(2);
        }
    });

    let code = match command {
        Command::Classify(config) => run_classify(config),
        Command::Scan(config) => run_scan(config),
        Command::InitConfig(config) => run_init_config(config),
    };
    process::exit(code);
}

fn load_config(overrides: &PipelineOverrides) -> Result<ClassifierConfig, String> {
    match overrides.config.as_ref() {
        Some(path) => ClassifierConfig::load(path).map_err(|error| error.to_string()),
        None => Ok(ClassifierConfig::load_or_default()),
    }
}

fn build_classifier(overrides: &PipelineOverrides) -> Result<Classifier<OrtEngine>, String> {
    let config = load_config(overrides)?;
    init_ort_runtime(&config.ort_library).map_err(|error| error.to_string())?;

    let model = overrides.model.clone().unwrap_or_else(|| config.model_path());
    let labels = overrides.labels.clone().unwrap_or_else(|| config.labels_path());
    let pipeline = overrides.apply(config.pipeline);
    tracing::debug!(
        model = %model.display(),
        labels = %labels.display(),
        input_side = pipeline.input_side,
        "loading classifier"
    );

    let classifier = Classifier::from_paths(OrtEngine, pipeline, &labels, &model);
    match classifier.init_error() {
        Some(error) => Err(format!("Error loading classifier: {}", error)),
        None => Ok(classifier),
    }
}

fn run_classify(config: ClassifyConfig) -> i32 {
    let classifier = match build_classifier(&config.overrides) {
        Ok(classifier) => classifier,
        Err(error) => {
            eprintln!("{}", error);
            return 1;
        }
    };

    let mut failures = 0;
    for path in &config.images {
        let result = image::open(path)
            .map_err(ClassifierError::from)
            .and_then(|image| classifier.classify(&image));
        match result {
            Ok(recognitions) => print_recognitions(path, &recognitions),
            Err(error) => {
                eprintln!("Error classifying {}: {}", path.display(), error);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        1
    } else {
        0
    }
}

fn run_scan(config: ScanCliConfig) -> i32 {
    let classifier = match build_classifier(&config.overrides) {
        Ok(classifier) => classifier,
        Err(error) => {
            eprintln!("{}", error);
            return 1;
        }
    };

    let progress_bar = progress::scan_progress(count_entries(&config.root));
    let scan_config = ScanConfig::new(config.extensions.clone(), config.threading);

    let summary = match scan(&config.root, &scan_config, &classifier, &progress_bar) {
        Ok(summary) => summary,
        Err(error) => {
            progress_bar.abandon_with_message("Scan aborted");
            eprintln!("Error scanning {}: {}", config.root.display(), error);
            return 1;
        }
    };
    progress_bar.finish_with_message("Scan complete");

    print_results(&summary);

    if let Some(output) = config.output.as_ref() {
        let report = create_report(&config.root, summary);
        match write_json(&report, output) {
            Ok(_) => println!("JSON report written to {}", output.display()),
            Err(error) => {
                eprintln!("Error writing JSON report to {}: {}", output.display(), error);
                return 1;
            }
        }
    }
    0
}

fn run_init_config(config: InitConfig) -> i32 {
    if config.path.exists() && !config.force {
        eprintln!(
            "{} already exists; pass --force to overwrite",
            config.path.display()
        );
        return 1;
    }

    match ClassifierConfig::default().save(&config.path) {
        Ok(_) => {
            println!("Configuration written to {}", config.path.display());
            0
        }
        Err(error) => {
            eprintln!("Error writing configuration: {}", error);
            1
        }
    }
}
