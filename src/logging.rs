use campfire_config::get_data_dir;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    prelude::*,
    EnvFilter,
};

lazy_static::lazy_static! {
    static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

pub fn log_init() {
    let directory = get_data_dir();
    std::fs::create_dir_all(directory.clone()).expect("Failed to create directory");
    let log_path = directory.join(LOG_FILE.clone());
    let log_file = std::fs::File::create(log_path).expect("Failed to create log file");

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .expect("Failed to initialize tracing subscriber");
}
