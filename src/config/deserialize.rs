// ABOUTME: Custom serde deserializers for validated domain types.
// ABOUTME: Keeps invalid names and references out of parsed configuration.

use serde::Deserialize;

use crate::types::StageName;

pub fn deserialize_stage_name<'de, D>(deserializer: D) -> Result<StageName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    StageName::new(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_stage_names_option<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<StageName>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<Vec<String>> = Option::deserialize(deserializer)?;
    opt.map(|values| {
        values
            .iter()
            .map(|s| StageName::new(s).map_err(serde::de::Error::custom))
            .collect()
    })
    .transpose()
}
