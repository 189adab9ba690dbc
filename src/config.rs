//! Process-wide configuration of the symbolication service.

use std::env;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::PoisonError;

use crate::log::debug;
use crate::Error;
use crate::Result;


/// The environment variable controlling
/// [`Config::current_image_only`].
pub const CURRENT_IMAGE_ONLY_ENV: &str = "SOURCEINFO_CURRENT_IMAGE_ONLY";


/// Configuration of the symbolication service.
///
/// The configuration is process-wide and consulted exactly once, when
/// the first address is symbolized. Use [`configure`] to install a
/// configuration before that happens. Absent an explicit
/// configuration, the one provided by [`Config::from_env`] is used.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Config {
    /// Whether to restrict the OS symbolication backend to the image
    /// containing this library.
    ///
    /// Some OS versions fail to enumerate all images loaded into a
    /// process. When set, the backend is provided with an explicit
    /// list containing only the current image instead.
    pub current_image_only: bool,
    /// The struct is non-exhaustive and open to extension.
    #[doc(hidden)]
    pub _non_exhaustive: (),
}

impl Config {
    /// Create a configuration based on the process' environment.
    pub fn from_env() -> Self {
        let current_image_only = env::var(CURRENT_IMAGE_ONLY_ENV)
            .map(|value| parse_bool(&value))
            .unwrap_or(false);

        Self {
            current_image_only,
            ..Default::default()
        }
    }

    /// Set [`Config::current_image_only`].
    pub fn with_current_image_only(self, current_image_only: bool) -> Self {
        Self {
            current_image_only,
            ..self
        }
    }
}

fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    ["1", "true", "yes"]
        .iter()
        .any(|truthy| value.eq_ignore_ascii_case(truthy))
}


/// Process-wide configuration state.
struct Settings {
    /// A configuration that was installed but not yet consumed.
    pending: Mutex<Option<Config>>,
    /// The effective configuration, fixed on first read.
    effective: OnceLock<Config>,
}

impl Settings {
    const fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            effective: OnceLock::new(),
        }
    }

    fn install(&self, config: Config) -> Result<()> {
        // `get` fixes the effective configuration under the same lock.
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if self.effective.get().is_some() {
            return Err(Error::with_already_exists(
                "configuration has already been read",
            ))
        }
        *pending = Some(config);
        Ok(())
    }

    fn get(&self) -> &Config {
        if let Some(config) = self.effective.get() {
            return config
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        self.effective.get_or_init(|| {
            let config = pending.take().unwrap_or_else(Config::from_env);
            debug!("using configuration {config:?}");
            config
        })
    }
}

static SETTINGS: Settings = Settings::new();


/// Install the process-wide configuration.
///
/// This function has to be called before the first address is
/// symbolized. Once the configuration has been read, an error of kind
/// [`AlreadyExists`][crate::ErrorKind::AlreadyExists] is returned.
pub fn configure(config: Config) -> Result<()> {
    SETTINGS.install(config)
}

/// Retrieve the effective configuration, fixing it in the process.
pub(crate) fn config() -> &'static Config {
    SETTINGS.get()
}
