// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operation options

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PfsError;

/// What to do when creating a file or folder whose name is taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationCollisionOption {
    /// Create under a free name of the form `name (2).txt`
    GenerateUniqueName = 0,
    /// Delete the existing entry and create a new, empty one
    ReplaceExisting = 1,
    #[default]
    FailIfExists = 2,
    /// Hand back the existing entry untouched
    OpenIfExists = 3,
}

/// What to do when a rename or move target is taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCollisionOption {
    GenerateUniqueName = 0,
    ReplaceExisting = 1,
    #[default]
    FailIfExists = 2,
}

impl From<NameCollisionOption> for CreationCollisionOption {
    fn from(option: NameCollisionOption) -> Self {
        match option {
            NameCollisionOption::GenerateUniqueName => CreationCollisionOption::GenerateUniqueName,
            NameCollisionOption::ReplaceExisting => CreationCollisionOption::ReplaceExisting,
            NameCollisionOption::FailIfExists => CreationCollisionOption::FailIfExists,
        }
    }
}

/// Access mode for [`crate::StorageFile::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAccess {
    Read = 0,
    ReadWrite = 1,
}

/// Options for whole-file writes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Drop existing content before writing
    pub truncate: bool,
}

impl WriteOptions {
    pub fn truncate() -> Self {
        Self { truncate: true }
    }

    pub fn overwrite_in_place() -> Self {
        Self { truncate: false }
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

macro_rules! option_codes {
    ($ty:ident, $label:literal, { $($code:literal => $variant:ident),+ $(,)? }) => {
        impl TryFrom<i32> for $ty {
            type Error = PfsError;

            fn try_from(code: i32) -> Result<Self, Self::Error> {
                match code {
                    $($code => Ok($ty::$variant),)+
                    other => Err(PfsError::InvalidArgument(format!(
                        "Unrecognized {}: {}", $label, other
                    ))),
                }
            }
        }

        impl FromStr for $ty {
            type Err = PfsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize(s);
                $(
                    if wanted == normalize(stringify!($variant)) {
                        return Ok($ty::$variant);
                    }
                )+
                Err(PfsError::InvalidArgument(format!("Unrecognized {}: {}", $label, s)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $($ty::$variant => stringify!($variant),)+
                };
                f.write_str(name)
            }
        }
    };
}

option_codes!(CreationCollisionOption, "CreationCollisionOption", {
    0 => GenerateUniqueName,
    1 => ReplaceExisting,
    2 => FailIfExists,
    3 => OpenIfExists,
});

option_codes!(NameCollisionOption, "NameCollisionOption", {
    0 => GenerateUniqueName,
    1 => ReplaceExisting,
    2 => FailIfExists,
});

option_codes!(FileAccess, "FileAccess", {
    0 => Read,
    1 => ReadWrite,
});
