mod command;
mod config;
mod prerequisites;
mod process;
mod runtime;

pub use config::DockerConfig;
pub use runtime::DockerRuntime;
