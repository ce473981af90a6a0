//! Round-tripping font collections.
//!
//! A [`Pipeline`] takes a collection through extraction, verification and a
//! conversion to text and back, stopping at the first stage that fails. The
//! stages run either in process or through external tools; see
//! [`runner::StageRunner`].

mod args;
mod config;
mod error;
mod pipeline;
pub mod report;
pub mod runner;
pub mod scratch;
pub mod tool;

use std::io::Write;

pub use args::{Args, ToolArgs, VerifyArgs};
pub use config::{Backend, Config};
pub use error::{Error, StageError};
pub use pipeline::{Pipeline, Stage};

/// Set up `env_logger`, at debug level if `verbose`. `RUST_LOG` still wins.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let ts = buf.timestamp_micros();
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{}: {style}{}{style:#}: {}",
                ts,
                record.level(),
                record.args()
            )
        })
        .init();
}
