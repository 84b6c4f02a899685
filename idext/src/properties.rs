use std::str::FromStr;

use idext_core::config::{Config, LegacyRangePolicy, UnregisteredPolicy};
use idext_core::protocol::chunk_data::LayoutVariant;

#[derive(Debug, PartialEq)]
pub struct IdextProperties {
    pub unregistered_ids: UnregisteredPolicy,
    pub legacy_tags: bool,
    pub legacy_range: LegacyRangePolicy,
    /// `None` picks the layout from the slot capabilities
    pub packet_layout: Option<LayoutVariant>,
    pub has_sky: bool
}

impl Default for IdextProperties {
    fn default() -> Self {
        IdextProperties {
            unregistered_ids: UnregisteredPolicy::Keep,
            legacy_tags: true,
            legacy_range: LegacyRangePolicy::Raise,
            packet_layout: None,
            has_sky: true
        }
    }
}

impl FromStr for IdextProperties {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        macro_rules! parse {
            ($value:ident, $dest:expr) => {
                if let Ok(v) = $value.parse() {
                    $dest = v;
                }
            }
        }

        let mut properties = IdextProperties::default();
        for (key, value) in s.lines()
                                .map(str::trim)
                                .filter(|l| !l.starts_with('#'))
                                .map(|l| l.split_once('=').unwrap_or((l, ""))) {
            match key {
                "unregistered-ids" => {
                    match value {
                        "remove" => properties.unregistered_ids = UnregisteredPolicy::Remove,
                        "keep" => properties.unregistered_ids = UnregisteredPolicy::Keep,
                        "raise" => properties.unregistered_ids = UnregisteredPolicy::Raise,
                        _ => {}
                    }
                }
                "legacy-tags" => parse!(value, properties.legacy_tags),
                "legacy-range" => {
                    match value {
                        "clamp" => properties.legacy_range = LegacyRangePolicy::Clamp,
                        "drop" => properties.legacy_range = LegacyRangePolicy::Drop,
                        "raise" => properties.legacy_range = LegacyRangePolicy::Raise,
                        _ => {}
                    }
                }
                "packet-layout" => {
                    match value {
                        "auto" => properties.packet_layout = None,
                        "interleaved" => properties.packet_layout = Some(LayoutVariant::Interleaved),
                        "grouped" => properties.packet_layout = Some(LayoutVariant::Grouped),
                        _ => {}
                    }
                }
                "has-sky" => parse!(value, properties.has_sky),
                _ => {}
            }
        }

        Ok(properties)
    }
}

impl From<IdextProperties> for Config {
    fn from(properties: IdextProperties) -> Config {
        Config {
            unregistered_policy: properties.unregistered_ids,
            legacy_tags: properties.legacy_tags,
            legacy_range_policy: properties.legacy_range,
            layout: properties.packet_layout,
            has_sky: properties.has_sky
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_default_idext_properties() {
        let parsed: IdextProperties = include_str!("../../idext.properties").parse().unwrap();
        assert_eq!(parsed, IdextProperties::default());
        assert_eq!(Config::from(parsed), Config::default());
    }

    #[test]
    fn parse_empty_idext_properties() {
        let parsed: IdextProperties = "".parse().unwrap();
        assert_eq!(parsed, IdextProperties::default());
    }

    #[test]
    fn parse_all_keys() {
        let parsed: IdextProperties = "unregistered-ids=remove\n\
                                       legacy-tags=false\n\
                                       legacy-range=clamp\n\
                                       packet-layout=grouped\n\
                                       has-sky=false".parse().unwrap();
        assert_eq!(parsed, IdextProperties {
            unregistered_ids: UnregisteredPolicy::Remove,
            legacy_tags: false,
            legacy_range: LegacyRangePolicy::Clamp,
            packet_layout: Some(LayoutVariant::Grouped),
            has_sky: false
        });
    }

    #[test]
    fn bad_values_keep_defaults() {
        let parsed: IdextProperties = "legacy-tags=maybe\nlegacy-range=wrap\n# has-sky=false".parse().unwrap();
        assert_eq!(parsed, IdextProperties::default());
    }
}
