mod app;
mod build_info;
mod coco_parser;
mod config;
mod error;
mod keymap;
mod logging;
mod overlay;
mod problem_log;
mod review;
mod settings;
mod store;
mod ui;

#[allow(unused_imports)]
use log::{Level, trace, debug, info, warn, error};

use std::process::ExitCode;
use clap::Parser;

use crate::build_info::BuildInfo;
use crate::config::{Args, ReviewConfig};
use crate::error::ReviewError;
use crate::review::ReviewSession;
use crate::settings::UserSettings;
use crate::store::{AnnotationStore, JsonFileStore};

const APP_NAME: &str = "fp-reviewer";

fn main() -> ExitCode {
    let args = Args::parse();

    let shared_log_buffer = logging::setup_logger();
    logging::setup_panic_hook(APP_NAME, shared_log_buffer);

    info!("{} {}", APP_NAME, BuildInfo::CURRENT);
    for line in BuildInfo::CURRENT.lines() {
        debug!("{}", line);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), ReviewError> {
    let settings = UserSettings::load(args.settings.as_deref());

    if args.write_settings {
        return match settings.save(args.settings.as_deref()) {
            Ok(path) => {
                println!("Settings written to {}", path.display());
                Ok(())
            }
            Err(e) => Err(ReviewError::io(
                args.settings.clone().unwrap_or_else(UserSettings::settings_path),
                std::io::Error::new(std::io::ErrorKind::Other, e),
            )),
        };
    }

    let config = ReviewConfig::resolve(&args, &settings)?;
    info!("Annotations: {}", config.input_json.display());
    info!("Images: {}", config.dataset_path.display());
    info!("Output: {}", config.output_json.display());

    let store = JsonFileStore::from_config(&config);
    let dataset = store.load()?;
    overlay::verify_image_directory(&dataset, &config.dataset_path)?;

    let mut session = ReviewSession::from_dataset(dataset)?;
    if let Some(ref file_name) = config.start_at {
        if session.jump_to_image(file_name).is_none() {
            return Err(ReviewError::StartImageNotFound(file_name.clone()));
        }
    }

    app::run(config, session, store)
}
