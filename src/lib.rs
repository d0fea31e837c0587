// Login Counter - Core Library
// Exposes all modules for use in the CLI, API server, and tests

pub mod config;
pub mod counter;
pub mod db;
pub mod directory;
pub mod error;
pub mod feature;
pub mod login;
pub mod object;
pub mod registry;
pub mod store;
pub mod subject;

// Re-export commonly used types
pub use config::Config;
pub use counter::LoginCounter;
pub use db::{setup_database, SqliteStore};
pub use directory::{MemoryDirectory, SubjectProvider};
pub use error::CounterError;
pub use feature::{CounterView, Feature, FEATURE_ID};
pub use login::{LoginDispatcher, LoginEvent, LoginEventSource, LoginHandler, LoginHook};
pub use object::ControlObject;
pub use registry::{login_counter_resolver, resolver, ObjectRegistry, Resolution, Resolver};
pub use store::{is_scalar, scalar_to_count, MemoryOptionStore, OptionKey, OptionStore};
pub use subject::{Subject, SubjectKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the fmt subscriber used by the binaries. `RUST_LOG` overrides `info`.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
