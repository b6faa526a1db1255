use env_logger::Env;

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => (
        {
            info!($($arg)*);
        }
    );
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => (
        {
            debug!($($arg)*);
        }
    );
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => (
        {
            warn!($($arg)*);
        }
    );
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => (
        {
            error!($($arg)*);
        }
    );
}

/// Initializes `env_logger`. Verbose runs default to `info`, otherwise only
/// `RUST_LOG` turns logging on.
pub fn init(verbose: bool) {
    let env = if verbose {
        Env::default().default_filter_or("info")
    } else {
        Env::default()
    };
    // A logger may already be installed (tests, embedding apps).
    env_logger::try_init_from_env(env).unwrap_or(());
}
