use clap::Parser;
use imagenet_unpack::{
    Cli, ImagenetUnpack, OutputFormatter, OutputMode, UnpackError, UserFriendlyError,
};
use std::process;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let app = match ImagenetUnpack::from_cli(&cli) {
        Ok(app) => app,
        Err(e) => {
            print_startup_error(&e);
            return exit_code_for(&e);
        }
    };

    if cli.dry_run {
        return handle_dry_run(&app);
    }

    match app.unpack().await {
        Ok(report) => {
            app.output_formatter().print_unpack_report(&report);

            if report.is_clean() {
                0
            } else {
                2 // Completed, with failures recorded under --on-error continue
            }
        }
        Err(e) => {
            app.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &UnpackError) -> i32 {
    match error {
        UnpackError::Cancelled => 130,
        UnpackError::NameFormat { .. } => 3,
        UnpackError::DirectoryExists { .. } => 4,
        UnpackError::ExtractionFailed { .. } | UnpackError::ToolNotFound { .. } => 5,
        UnpackError::Timeout { .. } => 6,
        UnpackError::FileSystem { .. } => 7,
        _ => 1,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "imagenet-unpack.toml".to_string());

    match ImagenetUnpack::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  imagenet-unpack --config {}", config_path);
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(app: &ImagenetUnpack) -> i32 {
    let formatter = app.output_formatter();

    formatter.info("DRY RUN MODE - Nothing will be created, extracted or deleted");
    formatter.print_separator();

    match app.print_plan() {
        Ok(true) => {
            formatter.print_separator();
            formatter.success("Dry run completed successfully");
            0
        }
        Ok(false) => {
            formatter.print_separator();
            formatter.error("Some archives would fail before extraction");
            1
        }
        Err(e) => {
            app.handle_error(&e);
            1
        }
    }
}

fn print_startup_error(error: &UnpackError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}
