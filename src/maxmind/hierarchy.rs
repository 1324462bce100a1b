//! Folds flat location rows into a deduplicated, parent-linked forest.
//!
//! Every node is keyed by its structural path: the level-ordered
//! concatenation of `/name|code` for each level a row fills. Two rows sharing
//! a continent and a country therefore share those two nodes. Nodes only
//! reached as ancestors carry a synthetic negative id derived from the path;
//! the deepest node of a row is "claimed" by it and takes the row's geoname
//! id, EU flag and timezone.
//!
//! Parents are linked by path and resolved in [`LocationTree::finish`], so
//! partial trees built independently can be combined with
//! [`LocationTree::merge`] without duplicating parent chains.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use strum::IntoEnumIterator;

use crate::geoip::ids::{synthetic_location_id, timezone_id};
use crate::geoip::{Location, LocationLevel, Timezone};

use super::models::MaxMindLocation;

#[derive(Debug, Clone)]
struct TreeNode {
    path: String,
    parent_path: Option<String>,
    location: Location,
    timezone: Option<String>,
    claimed: bool,
}

impl TreeNode {
    fn take_claim(&mut self, other: &TreeNode) {
        self.location.id = other.location.id;
        self.location.is_in_european_union = other.location.is_in_european_union;
        self.timezone = other.timezone.clone();
        self.claimed = true;
    }
}

/// Locations and timezones produced by a finished tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyResult {
    pub locations: Vec<Location>,
    pub timezones: Vec<Timezone>,
}

/// Partial or complete location forest for one locale.
#[derive(Debug, Clone)]
pub struct LocationTree {
    locale_code: String,
    nodes: Vec<TreeNode>,
    index: HashMap<String, usize>,
}

impl LocationTree {
    /// Creates an empty tree. `locale_code` is used for rows that do not
    /// carry their own locale.
    pub fn new(locale_code: impl Into<String>) -> Self {
        LocationTree {
            locale_code: locale_code.into(),
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Number of distinct nodes accumulated so far, across all levels.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no row has contributed a node yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds one row to the tree.
    ///
    /// Returns `false` when the row fills no level at all; such a row
    /// contributes nothing.
    pub fn accumulate(&mut self, row: MaxMindLocation) -> bool {
        let locale_code = row
            .locale_code
            .clone()
            .unwrap_or_else(|| self.locale_code.clone());

        let mut path = String::new();
        let mut parent_path: Option<String> = None;
        let mut own = None;

        for level in LocationLevel::iter() {
            let (name, code) = row.level_fields(level);
            if name.is_none() && code.is_none() {
                continue;
            }
            path.push('/');
            path.push_str(name.unwrap_or_default());
            path.push('|');
            path.push_str(code.unwrap_or_default());

            let idx = match self.index.get(&path) {
                Some(&idx) => idx,
                None => self.insert(TreeNode {
                    path: path.clone(),
                    parent_path: parent_path.clone(),
                    location: Location {
                        id: synthetic_location_id(&path),
                        locale_code: locale_code.clone(),
                        parent_id: None,
                        level,
                        name: name.map(str::to_string),
                        code: code.map(str::to_string),
                        is_in_european_union: None,
                        timezone_id: None,
                    },
                    timezone: None,
                    claimed: false,
                }),
            };
            parent_path = Some(path.clone());
            own = Some(idx);
        }

        let Some(idx) = own else {
            return false;
        };
        let node = &mut self.nodes[idx];
        if node.claimed {
            debug!(
                "Location {} already claimed by {}, ignoring geoname id {:?}",
                node.path, node.location.id, row.geoname_id
            );
            return true;
        }
        if let Some(id) = row.geoname_id {
            node.location.id = id;
        }
        node.location.is_in_european_union = row.is_in_european_union;
        node.timezone = row.time_zone;
        node.claimed = true;
        true
    }

    /// Combines two partial trees.
    ///
    /// For a path present in both, the node of `self` is kept; it takes over
    /// the claim of `other`'s node when it was never claimed itself. Nodes new
    /// to `self` are appended and link to whichever node holds their parent
    /// path in the combined tree.
    pub fn merge(mut self, other: LocationTree) -> LocationTree {
        for node in other.nodes {
            match self.index.get(&node.path) {
                Some(&idx) => {
                    let existing = &mut self.nodes[idx];
                    if !existing.claimed && node.claimed {
                        existing.take_claim(&node);
                    }
                }
                None => {
                    self.insert(node);
                }
            }
        }
        self
    }

    /// Resolves parent and timezone ids and collects the distinct timezones.
    pub fn finish(self) -> HierarchyResult {
        let ids: HashMap<&str, i64> = self
            .nodes
            .iter()
            .map(|node| (node.path.as_str(), node.location.id))
            .collect();

        let mut timezone_names = BTreeSet::new();
        let mut locations = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mut location = node.location.clone();
            location.parent_id = node
                .parent_path
                .as_deref()
                .and_then(|parent| ids.get(parent).copied());
            if let Some(name) = &node.timezone {
                location.timezone_id = Some(timezone_id(name));
                timezone_names.insert(name.clone());
            }
            locations.push(location);
        }

        let timezones = timezone_names
            .into_iter()
            .map(|name| Timezone {
                id: timezone_id(&name),
                name,
            })
            .collect();

        HierarchyResult {
            locations,
            timezones,
        }
    }

    fn insert(&mut self, node: TreeNode) -> usize {
        let idx = self.nodes.len();
        self.index.insert(node.path.clone(), idx);
        self.nodes.push(node);
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        geoname_id: i64,
        continent: (&str, &str),
        country: (&str, &str),
        city: Option<&str>,
    ) -> MaxMindLocation {
        MaxMindLocation {
            geoname_id: Some(geoname_id),
            locale_code: Some("en".to_string()),
            continent_name: Some(continent.0.to_string()),
            continent_code: Some(continent.1.to_string()),
            country_name: Some(country.0.to_string()),
            country_iso_code: Some(country.1.to_string()),
            is_in_european_union: Some(true),
            city_name: city.map(str::to_string),
            time_zone: Some("Europe/Paris".to_string()),
            ..MaxMindLocation::default()
        }
    }

    fn by_name<'a>(result: &'a HierarchyResult, name: &str) -> Vec<&'a Location> {
        result
            .locations
            .iter()
            .filter(|l| l.name.as_deref() == Some(name))
            .collect()
    }

    #[test]
    fn test_shared_ancestors_are_deduplicated() {
        let mut tree = LocationTree::new("en");
        assert!(tree.accumulate(row(1, ("Europe", "EU"), ("France", "FR"), Some("Paris"))));
        assert!(tree.accumulate(row(2, ("Europe", "EU"), ("France", "FR"), Some("Lyon"))));
        let result = tree.finish();

        let europe = by_name(&result, "Europe");
        let france = by_name(&result, "France");
        assert_eq!(europe.len(), 1);
        assert_eq!(france.len(), 1);
        assert_eq!(result.locations.len(), 4);

        let paris = by_name(&result, "Paris")[0];
        let lyon = by_name(&result, "Lyon")[0];
        assert_eq!(paris.id, 1);
        assert_eq!(lyon.id, 2);
        assert_eq!(paris.parent_id, Some(france[0].id));
        assert_eq!(lyon.parent_id, Some(france[0].id));
        assert_eq!(france[0].parent_id, Some(europe[0].id));
        assert_eq!(europe[0].parent_id, None);
        assert_eq!(paris.level, LocationLevel::City);
    }

    #[test]
    fn test_ancestors_keep_synthetic_ids() {
        let mut tree = LocationTree::new("en");
        tree.accumulate(row(1, ("Europe", "EU"), ("France", "FR"), Some("Paris")));
        let result = tree.finish();

        let france = by_name(&result, "France")[0];
        assert!(france.id < 0);
        assert_eq!(france.id, synthetic_location_id("/Europe|EU/France|FR"));
        assert_eq!(france.timezone_id, None);
        assert_eq!(france.is_in_european_union, None);
    }

    #[test]
    fn test_late_claim_replaces_synthetic_id() {
        let mut tree = LocationTree::new("en");
        tree.accumulate(row(1, ("Europe", "EU"), ("France", "FR"), Some("Paris")));
        tree.accumulate(row(3017382, ("Europe", "EU"), ("France", "FR"), None));
        let result = tree.finish();

        let france = by_name(&result, "France")[0];
        assert_eq!(france.id, 3017382);
        assert_eq!(france.is_in_european_union, Some(true));
        assert_eq!(by_name(&result, "Paris")[0].parent_id, Some(3017382));
    }

    #[test]
    fn test_timezones_are_distinct_and_linked() {
        let mut tree = LocationTree::new("en");
        tree.accumulate(row(1, ("Europe", "EU"), ("France", "FR"), Some("Paris")));
        tree.accumulate(row(2, ("Europe", "EU"), ("France", "FR"), Some("Lyon")));
        let mut no_zone = row(3, ("Europe", "EU"), ("France", "FR"), Some("Nice"));
        no_zone.time_zone = None;
        tree.accumulate(no_zone);
        let result = tree.finish();

        assert_eq!(result.timezones.len(), 1);
        let zone = &result.timezones[0];
        assert_eq!(zone.name, "Europe/Paris");
        assert_eq!(by_name(&result, "Paris")[0].timezone_id, Some(zone.id));
        assert_eq!(by_name(&result, "Nice")[0].timezone_id, None);
    }

    #[test]
    fn test_empty_row_contributes_nothing() {
        let mut tree = LocationTree::new("en");
        assert!(!tree.accumulate(MaxMindLocation {
            geoname_id: Some(5),
            ..MaxMindLocation::default()
        }));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_absent_locale_uses_tree_locale() {
        let mut tree = LocationTree::new("de");
        let mut r = row(1, ("Europa", "EU"), ("Frankreich", "FR"), None);
        r.locale_code = None;
        tree.accumulate(r);
        let result = tree.finish();
        assert!(result.locations.iter().all(|l| l.locale_code == "de"));
    }

    #[test]
    fn test_merge_matches_sequential_fold() {
        let rows = vec![
            row(1, ("Europe", "EU"), ("France", "FR"), Some("Paris")),
            row(2, ("Europe", "EU"), ("Germany", "DE"), Some("Berlin")),
            row(3017382, ("Europe", "EU"), ("France", "FR"), None),
            row(2921044, ("Europe", "EU"), ("Germany", "DE"), None),
        ];

        let mut sequential = LocationTree::new("en");
        for r in rows.clone() {
            sequential.accumulate(r);
        }

        let mut left = LocationTree::new("en");
        let mut right = LocationTree::new("en");
        for (i, r) in rows.into_iter().enumerate() {
            if i % 2 == 0 {
                left.accumulate(r);
            } else {
                right.accumulate(r);
            }
        }
        let merged = left.merge(right);

        let mut expected = sequential.finish().locations;
        let mut actual = merged.finish().locations;
        expected.sort_by_key(|l| l.id);
        actual.sort_by_key(|l| l.id);
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_merge_relinks_to_existing_parent() {
        let mut left = LocationTree::new("en");
        left.accumulate(row(10, ("Europe", "EU"), ("France", "FR"), None));
        let mut right = LocationTree::new("en");
        right.accumulate(row(1, ("Europe", "EU"), ("France", "FR"), Some("Paris")));

        let result = left.merge(right).finish();
        assert_eq!(by_name(&result, "France").len(), 1);
        assert_eq!(by_name(&result, "Paris")[0].parent_id, Some(10));
    }
}
