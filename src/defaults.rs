// Config file location relative to $HOME.
pub const CONFIG_PATH: &str = ".config/feedstore/config.toml";

// Store file location relative to $HOME when neither the config file nor the
// command line provide one.
pub const STORE_PATH: &str = ".cache/feedstore/feed.store";

// First line of every store file. Bump when the payload layout changes.
pub const STORE_FILE_HEADER: &str = "feedstore-v1";

// Suffix of the sibling file a save writes before renaming it over the store.
pub const STORE_TMP_SUFFIX: &str = ".tmp";

// Name of the store's worker thread.
pub const WORKER_THREAD_NAME: &str = "feedstore-worker";
