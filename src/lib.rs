//! `econscraper`: fetches economic indicator series and reshapes heterogeneous
//! spreadsheet/CSV exports into Year-keyed tables.

pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod process;

#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,econscraper=debug")),
        )
        .with_test_writer() // Redirect logs to the test output
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber); // Use `let _ =` to ignore errors if already set
}
