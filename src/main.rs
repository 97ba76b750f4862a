use clap::Parser;
use podextract::{
    logging, Cli, ExecutionReport, OutputFormatter, OutputMode, PodExtract, PodExtractError,
    UserFriendlyError,
};
use std::process;

const EXIT_OK: i32 = 0;
const EXIT_GENERAL: i32 = 1;
const EXIT_FAILED_ENTRIES: i32 = 2;
const EXIT_INVALID_SOURCE: i32 = 3;
const EXIT_DESTINATION_UNWRITABLE: i32 = 4;
const EXIT_NO_MEDIA: i32 = 6;
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbosity_level(), cli.quiet) {
        eprintln!("{e}");
    }

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let app = match PodExtract::from_cli(&cli) {
        Ok(app) => app,
        Err(e) => {
            print_startup_error(&cli, &e);
            return exit_code_for(&e);
        }
    };

    // required by clap unless --generate-config was given
    let Some(source) = cli.source.as_deref() else {
        return EXIT_GENERAL;
    };

    let plan = match app.plan(source).await {
        Ok(plan) => plan,
        Err(e) => {
            app.handle_error(&e);
            return exit_code_for(&e);
        }
    };

    if cli.is_listing() {
        app.output_formatter()
            .print_plan(&plan, cli.destination.as_deref());
        return EXIT_OK;
    }

    let Some(destination) = cli.destination.as_deref() else {
        return EXIT_GENERAL;
    };

    match app.extract(&plan, destination).await {
        Ok(report) => {
            app.output_formatter().print_execution_report(&report);
            exit_code_for_report(&report)
        }
        Err(e) => {
            app.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &PodExtractError) -> i32 {
    match error {
        PodExtractError::Cancelled => EXIT_CANCELLED,
        PodExtractError::InvalidPath { .. } => EXIT_INVALID_SOURCE,
        PodExtractError::DestinationUnwritable { .. } => EXIT_DESTINATION_UNWRITABLE,
        PodExtractError::NoMediaFound { .. } => EXIT_NO_MEDIA,
        _ => EXIT_GENERAL,
    }
}

fn exit_code_for_report(report: &ExecutionReport) -> i32 {
    if report.cancelled {
        EXIT_CANCELLED
    } else if report.failed > 0 {
        EXIT_FAILED_ENTRIES
    } else {
        EXIT_OK
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(podextract::default_config_file);

    match PodExtract::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path.display());
            println!("\nTo use this configuration:");
            println!(
                "  podextract <SOURCE> <DESTINATION> --config {}",
                config_path.display()
            );
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            EXIT_GENERAL
        }
    }
}

fn print_startup_error(cli: &Cli, error: &PodExtractError) {
    let mode = match cli.output_mode() {
        OutputMode::Json => OutputMode::Json,
        _ => OutputMode::Human,
    };
    OutputFormatter::new(mode, 0, false).print_user_friendly_error(error);
}
