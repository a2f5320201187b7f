use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the server receives requests.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ServiceMode {
    /// Own a well-known name on the message bus and serve method calls.
    #[default]
    Bus,
    /// Read one request per line from stdin and write framed replies to
    /// stdout.
    Stdio,
}
