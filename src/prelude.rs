pub use anyhow::{anyhow, bail, Error, Result};
pub use chrono::{DateTime, Utc};
pub use log::{debug, error, info, trace, warn};
pub use std::io::Write;
pub use tokio::sync::broadcast;

pub use crate::config::{self, Config};
pub use crate::file_error;
pub use crate::measurement::MeasurementRecord;
pub use crate::options::Options;
pub use crate::register::{self, BlockType, DecodeError, Fields};
