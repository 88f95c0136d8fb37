//! Config namespace: layered settings files and the resolved serve config.

mod serve;
mod settings;

pub use serve::{DEFAULT_BIND, ServeConfig};
pub use settings::{
    RuntimeSettings, SupervisorSettings, load_runtime_settings, load_runtime_settings_from_paths,
    runtime_settings_paths, set_config_home_override,
};
