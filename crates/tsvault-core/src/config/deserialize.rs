use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

pub(super) const STRICT_STRING_ERROR: &str =
    "expected text; quote values such as ports in hosts, cron schedules or numeric names";
pub(super) const NULL_VALUE_ERROR: &str = "empty value; set it or remove the key";

/// Which YAML scalars a text field takes. Durations may be bare integers
/// (`retention.daily: 7` means seven days); everything else must be a string.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Scalar {
    Text,
    Duration,
}

struct ScalarVisitor(Scalar);

impl ScalarVisitor {
    fn integer<E: de::Error>(&self, v: impl fmt::Display) -> Result<String, E> {
        match self.0 {
            Scalar::Duration => Ok(v.to_string()),
            Scalar::Text => Err(E::custom(STRICT_STRING_ERROR)),
        }
    }
}

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Scalar::Text => f.write_str("a string"),
            Scalar::Duration => f.write_str("a duration such as 30h, 7d, 4w or a number of days"),
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
        self.integer(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
        self.integer(v)
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<String, E> {
        Err(E::custom(STRICT_STRING_ERROR))
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<String, E> {
        Err(E::custom(STRICT_STRING_ERROR))
    }

    fn visit_unit<E: de::Error>(self) -> Result<String, E> {
        Err(E::custom(NULL_VALUE_ERROR))
    }
}

/// A config scalar wrapped so it can sit inside `Option`, `Vec` and map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct StrictString(String);

impl StrictString {
    pub(super) fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for StrictString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(ScalarVisitor(Scalar::Text))
            .map(StrictString)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct DurationString(String);

impl<'de> Deserialize<'de> for DurationString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(ScalarVisitor(Scalar::Duration))
            .map(DurationString)
    }
}

pub(super) fn deserialize_strict_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    StrictString::deserialize(deserializer).map(StrictString::into_inner)
}

/// Optional keys may be omitted, never written as `~`.
pub(super) fn deserialize_optional_strict_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Option::<StrictString>::deserialize(deserializer)? {
        Some(v) => Ok(Some(v.into_inner())),
        None => Err(de::Error::custom(NULL_VALUE_ERROR)),
    }
}

pub(super) fn deserialize_duration_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    DurationString::deserialize(deserializer).map(|d| d.0)
}

pub(super) fn deserialize_optional_duration_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Option::<DurationString>::deserialize(deserializer)? {
        Some(v) => Ok(Some(v.0)),
        None => Err(de::Error::custom(NULL_VALUE_ERROR)),
    }
}

/// Commands of one hook key: `failed: notify-ops` or `failed: [a, b]`.
struct HookCommands(Vec<String>);

impl<'de> Deserialize<'de> for HookCommands {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CommandsVisitor;

        impl<'de> Visitor<'de> for CommandsVisitor {
            type Value = HookCommands;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a shell command or a list of shell commands")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<HookCommands, E> {
                Ok(HookCommands(vec![v.to_string()]))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<HookCommands, E> {
                Ok(HookCommands(vec![v]))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<HookCommands, A::Error> {
                let mut commands = Vec::new();
                while let Some(cmd) = seq.next_element::<StrictString>()? {
                    commands.push(cmd.into_inner());
                }
                Ok(HookCommands(commands))
            }
        }

        deserializer.deserialize_any(CommandsVisitor)
    }
}

/// Hook key to commands. Key names are checked later by `HooksConfig::validate`.
pub(super) fn deserialize_hooks_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<String, Vec<String>>, D::Error> {
    let raw = HashMap::<StrictString, HookCommands>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, cmds)| (key.into_inner(), cmds.0))
        .collect())
}
